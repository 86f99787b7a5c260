//! Shared fixtures for the desk integration tests.
#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use complaint_desk_core::{
    classifier::{Classification, Classifier, ClassifierError},
    clock::ManualClock,
    complaint::{ComplaintIntake, Sentiment},
    config::DeskConfig,
    desk::ComplaintDesk,
    directory::{ActingUser, Agent, Role},
    store::DeskStore,
    types::Timestamp,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub const ORG: &str = "org-test";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Reads the priority from a leading `P<n>:` marker in the complaint text,
/// e.g. `"P5: card stolen"`. Unmarked text classifies as priority 3.
pub struct MarkerClassifier;

impl Classifier for MarkerClassifier {
    fn name(&self) -> &'static str {
        "marker"
    }

    fn classify(&self, text: &str) -> Result<Classification, ClassifierError> {
        let priority = text
            .strip_prefix('P')
            .and_then(|rest| rest.split(':').next())
            .and_then(|n| n.trim().parse::<u8>().ok())
            .unwrap_or(3);
        Ok(Classification {
            complaint_type: if priority >= 4 { "Fraud" } else { "Billing" }.into(),
            issue: "Test issue".into(),
            priority_score: priority,
            sentiment: if priority >= 4 {
                Sentiment::Negative
            } else {
                Sentiment::Neutral
            },
        })
    }
}

/// Replays a fixed queue of results, one per call.
pub struct ScriptedClassifier {
    script: Mutex<VecDeque<Result<Classification, ClassifierError>>>,
}

impl ScriptedClassifier {
    pub fn new(script: Vec<Result<Classification, ClassifierError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
        }
    }
}

impl Classifier for ScriptedClassifier {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn classify(&self, _text: &str) -> Result<Classification, ClassifierError> {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ClassifierError::Unavailable("script exhausted".into())))
    }
}

pub fn memory_store() -> DeskStore {
    let store = DeskStore::in_memory().unwrap();
    store.migrate().unwrap();
    store
}

pub fn marker_desk() -> ComplaintDesk {
    init_logging();
    ComplaintDesk::from_config(
        &DeskConfig::default_test(),
        memory_store(),
        Box::new(MarkerClassifier),
    )
}

pub fn start_time() -> Timestamp {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

/// Desk whose clock only moves when the returned handle is advanced.
pub fn marker_desk_with_clock() -> (ComplaintDesk, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(start_time()));
    let desk = marker_desk().with_clock(Box::new(clock.clone()));
    (desk, clock)
}

pub fn add_staff(desk: &ComplaintDesk, agent_id: &str, name: &str, role: Role) {
    desk.store()
        .upsert_agent(&Agent {
            agent_id: agent_id.into(),
            org_id: desk.org_id().into(),
            name: name.into(),
            email: format!("{agent_id}@example.com"),
            role,
        })
        .unwrap();
}

pub fn intake(text: &str) -> ComplaintIntake {
    ComplaintIntake {
        customer_name: "Jordan Lee".into(),
        customer_email: "jordan@example.com".into(),
        complaint: text.into(),
        channel: None,
    }
}

pub fn admin() -> ActingUser {
    ActingUser::new("admin-1", Role::Admin)
}

pub fn operator() -> ActingUser {
    ActingUser::new("agent-op", Role::Agent)
}

pub fn fraud(priority: u8) -> Classification {
    Classification {
        complaint_type: "Fraud".into(),
        issue: "Unauthorized transaction".into(),
        priority_score: priority,
        sentiment: Sentiment::Negative,
    }
}
