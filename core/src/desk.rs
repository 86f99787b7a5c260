//! The complaint desk: lifecycle operations for one organization.
//!
//! FLOW:
//!   intake → classifier → assignment policy → store (create)
//!   operator action → load → Complaint::apply → version-checked save
//!
//! RULES:
//!   - Every mutation is read-modify-append-persist on a single record,
//!     committed by one conditional update keyed on the record's version.
//!   - A stale save is retried from a fresh read, a bounded number of times,
//!     then surfaces as `Conflict`.
//!   - Classification failure aborts intake; nothing is stored.

use crate::{
    assignment,
    classifier::{Classification, Classifier, FixedClassifier},
    clock::{Clock, SystemClock},
    complaint::{Complaint, ComplaintFilter, ComplaintIntake, ComplaintStatus, ComplaintView, Transition},
    config::DeskConfig,
    dashboard::{self, DashboardStats},
    directory::{ActingUser, AgentDirectory},
    error::{DeskError, DeskResult},
    store::{DeskStore, SaveOutcome},
    types::OrgId,
};
use chrono::SubsecRound;
use serde::{Deserialize, Serialize};

/// Listing request. Unset paging fields fall back to the desk defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub status: Option<ComplaintStatus>,
    #[serde(default)]
    pub priority: Option<u8>,
    #[serde(default, rename = "type")]
    pub complaint_type: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub pages: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComplaintPage {
    pub complaints: Vec<ComplaintView>,
    pub pagination: Pagination,
}

pub struct ComplaintDesk {
    org_id: OrgId,
    store: DeskStore,
    classifier: Box<dyn Classifier>,
    clock: Box<dyn Clock>,
    max_conflict_retries: u32,
    default_page_size: u32,
    max_page_size: u32,
}

impl ComplaintDesk {
    pub fn from_config(config: &DeskConfig, store: DeskStore, classifier: Box<dyn Classifier>) -> Self {
        Self {
            org_id: config.org_id.clone(),
            store,
            classifier,
            clock: Box::new(SystemClock),
            max_conflict_retries: config.max_conflict_retries.max(1),
            default_page_size: config.default_page_size,
            max_page_size: config.max_page_size,
        }
    }

    /// In-memory, migrated desk for org `org-test` that classifies every
    /// complaint as `classification`.
    pub fn build_test(classification: Classification) -> DeskResult<Self> {
        let config = DeskConfig::default_test();
        let store = DeskStore::in_memory()?;
        store.migrate()?;
        Ok(Self::from_config(
            &config,
            store,
            Box::new(FixedClassifier::new(classification)),
        ))
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn org_id(&self) -> &str {
        &self.org_id
    }

    pub fn store(&self) -> &DeskStore {
        &self.store
    }

    /// Store precision is milliseconds; keep in-memory records identical to
    /// what a reload returns.
    fn now(&self) -> crate::types::Timestamp {
        self.clock.now().trunc_subsecs(3)
    }

    // ── Intake ─────────────────────────────────────────────────────

    /// Register a new complaint. High-priority complaints are auto-assigned
    /// to the least-busy agent when one exists.
    pub fn register(&self, intake: ComplaintIntake) -> DeskResult<Complaint> {
        intake.validate()?;

        let classification = self.classifier.classify(&intake.complaint).map_err(|e| {
            log::warn!(
                "org={} intake: classifier '{}' failed: {e}",
                self.org_id,
                self.classifier.name()
            );
            e
        })?;

        let now = self.now();
        let mut complaint = Complaint::new(
            uuid::Uuid::new_v4().to_string(),
            self.org_id.clone(),
            intake,
            classification.clone(),
            now,
        );

        let persisted = (|| -> DeskResult<()> {
            let selected = assignment::select_agent(
                &self.org_id,
                complaint.priority_score,
                &self.store,
                &self.store,
            )?;
            if let Some(agent) = selected {
                log::info!(
                    "org={} complaint={} auto-assigned to {} (active load {})",
                    self.org_id,
                    complaint.complaint_id,
                    agent.agent_id,
                    agent.active
                );
                complaint.apply(Transition::AutoAssign { agent_id: agent.agent_id }, now);
            }
            self.store.insert_complaint(&complaint)
        })();

        if let Err(source) = persisted {
            log::error!(
                "org={} complaint={} classified but not stored: {source}",
                self.org_id,
                complaint.complaint_id
            );
            return Err(DeskError::Unpersisted {
                classification,
                source: Box::new(source),
            });
        }

        log::info!(
            "org={} complaint={} registered: type={} priority={} status={}",
            self.org_id,
            complaint.complaint_id,
            complaint.complaint_type,
            complaint.priority_score,
            complaint.status
        );
        Ok(complaint)
    }

    // ── Operator actions ───────────────────────────────────────────

    pub fn assign(&self, complaint_id: &str, agent_id: &str, actor: &ActingUser) -> DeskResult<Complaint> {
        self.mutate(complaint_id, |_| {
            let agent = self
                .store
                .find_agent_by_id(&self.org_id, agent_id)?
                .ok_or_else(|| DeskError::not_found("Agent", agent_id))?;
            Ok(Transition::Assign {
                agent_id: agent.agent_id,
                agent_name: agent.name,
                by: actor.id.clone(),
            })
        })
    }

    pub fn add_reply(&self, complaint_id: &str, reply: &str, actor: &ActingUser) -> DeskResult<Complaint> {
        if reply.trim().is_empty() {
            return Err(DeskError::Validation("Reply is required".into()));
        }
        self.mutate(complaint_id, |_| {
            Ok(Transition::Reply {
                reply: reply.to_string(),
                by: actor.id.clone(),
            })
        })
    }

    /// Resolve without a reply. Calling this on an already-resolved complaint
    /// succeeds: the resolver and timestamp are overwritten and one more
    /// history entry is appended.
    pub fn mark_resolved(
        &self,
        complaint_id: &str,
        comment: Option<&str>,
        actor: &ActingUser,
    ) -> DeskResult<Complaint> {
        self.mutate(complaint_id, |_| {
            Ok(Transition::Resolve {
                comment: comment.map(str::to_string),
                by: actor.id.clone(),
            })
        })
    }

    pub fn escalate(
        &self,
        complaint_id: &str,
        reason: Option<&str>,
        actor: &ActingUser,
    ) -> DeskResult<Complaint> {
        actor.require_admin("escalate complaints")?;
        self.mutate(complaint_id, |_| {
            Ok(Transition::Escalate {
                reason: reason.map(str::to_string),
                by: actor.id.clone(),
            })
        })
    }

    /// Load, transition, save. Retries from a fresh read when another writer
    /// got there first.
    fn mutate<F>(&self, complaint_id: &str, mut transition_for: F) -> DeskResult<Complaint>
    where
        F: FnMut(&Complaint) -> DeskResult<Transition>,
    {
        for attempt in 1..=self.max_conflict_retries {
            let mut complaint = self.load(complaint_id)?.complaint;
            let expected_version = complaint.version;
            let persisted_history = complaint.history.len();

            let transition = transition_for(&complaint)?;
            let label = transition.label();
            complaint.apply(transition, self.now());

            match self
                .store
                .save_complaint(&complaint, expected_version, persisted_history)?
            {
                SaveOutcome::Saved { version } => {
                    complaint.version = version;
                    log::info!(
                        "org={} complaint={} {} -> status={} (v{version})",
                        self.org_id,
                        complaint_id,
                        label.as_str(),
                        complaint.status
                    );
                    return Ok(complaint);
                }
                SaveOutcome::Stale => {
                    log::debug!(
                        "org={} complaint={} version {expected_version} stale, attempt {attempt}/{}",
                        self.org_id,
                        complaint_id,
                        self.max_conflict_retries
                    );
                }
            }
        }
        log::warn!(
            "org={} complaint={} gave up after {} conflicting writes",
            self.org_id,
            complaint_id,
            self.max_conflict_retries
        );
        Err(DeskError::Conflict(format!(
            "Complaint {complaint_id} was modified concurrently; retry the request"
        )))
    }

    // ── Reads ──────────────────────────────────────────────────────

    fn load(&self, complaint_id: &str) -> DeskResult<ComplaintView> {
        self.store
            .get_complaint(&self.org_id, complaint_id)?
            .ok_or_else(|| DeskError::not_found("Complaint", complaint_id))
    }

    pub fn get(&self, complaint_id: &str) -> DeskResult<ComplaintView> {
        self.load(complaint_id)
    }

    pub fn list(&self, query: &ListQuery) -> DeskResult<ComplaintPage> {
        let page = query.page.unwrap_or(1);
        let limit = query.limit.unwrap_or(self.default_page_size);
        if page < 1 {
            return Err(DeskError::Validation("page must be at least 1".into()));
        }
        if limit < 1 {
            return Err(DeskError::Validation("limit must be at least 1".into()));
        }
        let limit = limit.min(self.max_page_size);

        let filter = ComplaintFilter {
            status: query.status,
            priority_score: query.priority,
            complaint_type: query.complaint_type.clone(),
            escalated_only: false,
        };
        let offset = u64::from(page - 1) * u64::from(limit);
        let complaints = self.store.list_complaints(&self.org_id, &filter, Some(limit), offset)?;
        let total = self.store.count_complaints(&self.org_id, &filter)?;
        let pages = (total + i64::from(limit) - 1) / i64::from(limit);

        Ok(ComplaintPage {
            complaints,
            pagination: Pagination {
                total,
                page,
                limit,
                pages,
            },
        })
    }

    /// Every complaint that has ever been escalated, newest first. Admin only.
    pub fn escalated(&self, actor: &ActingUser) -> DeskResult<Vec<ComplaintView>> {
        actor.require_admin("view escalated complaints")?;
        let filter = ComplaintFilter {
            escalated_only: true,
            ..ComplaintFilter::default()
        };
        self.store.list_complaints(&self.org_id, &filter, None, 0)
    }

    pub fn dashboard(&self) -> DeskResult<DashboardStats> {
        dashboard::compute(&self.store, &self.org_id)
    }
}
