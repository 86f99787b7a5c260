//! Complaint model and lifecycle state machine.
//!
//! A complaint moves Pending → InProgress → Resolved | Escalated.
//! Escalated is reachable from every status and never locks the complaint:
//! an escalated complaint can still be reassigned or resolved.
//!
//! RULE: status only changes through `Complaint::apply`, which appends
//! exactly one history entry per transition. History is never rewritten.

use crate::{
    classifier::Classification,
    error::{DeskError, DeskResult},
    types::{AgentId, ComplaintId, OrgId, Timestamp, UserId},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const AUTO_ASSIGN_COMMENT: &str = "Auto-assigned due to high priority";
pub const REPLY_COMMENT: &str = "Complaint resolved with reply";
pub const DEFAULT_RESOLVE_COMMENT: &str = "Marked as resolved";
pub const DEFAULT_ESCALATE_COMMENT: &str = "Escalated by admin";

// ── Enumerations ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComplaintStatus {
    Pending,
    InProgress,
    Resolved,
    Escalated,
}

impl ComplaintStatus {
    pub const ALL: [ComplaintStatus; 4] = [
        ComplaintStatus::Pending,
        ComplaintStatus::InProgress,
        ComplaintStatus::Resolved,
        ComplaintStatus::Escalated,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ComplaintStatus::Pending => "Pending",
            ComplaintStatus::InProgress => "InProgress",
            ComplaintStatus::Resolved => "Resolved",
            ComplaintStatus::Escalated => "Escalated",
        }
    }

    /// Active complaints count toward an agent's load.
    pub fn is_active(self) -> bool {
        match self {
            ComplaintStatus::Pending | ComplaintStatus::InProgress => true,
            ComplaintStatus::Resolved | ComplaintStatus::Escalated => false,
        }
    }
}

impl fmt::Display for ComplaintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComplaintStatus {
    type Err = DeskError;

    fn from_str(s: &str) -> DeskResult<Self> {
        ComplaintStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DeskError::Validation(format!("Unknown complaint status: {s}")))
    }
}

/// Intake channel. The set is fixed; `Web` is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Channel {
    Email,
    #[default]
    Web,
    #[serde(rename = "Social Media")]
    SocialMedia,
    #[serde(rename = "Live Chat")]
    LiveChat,
}

impl Channel {
    pub const ALL: [Channel; 4] = [
        Channel::Email,
        Channel::Web,
        Channel::SocialMedia,
        Channel::LiveChat,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Email => "Email",
            Channel::Web => "Web",
            Channel::SocialMedia => "Social Media",
            Channel::LiveChat => "Live Chat",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = DeskError;

    fn from_str(s: &str) -> DeskResult<Self> {
        Channel::ALL
            .into_iter()
            .find(|channel| channel.as_str() == s)
            .ok_or_else(|| DeskError::Validation(format!("Unknown channel: {s}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn as_str(self) -> &'static str {
        match self {
            Sentiment::Positive => "Positive",
            Sentiment::Neutral => "Neutral",
            Sentiment::Negative => "Negative",
        }
    }
}

impl FromStr for Sentiment {
    type Err = DeskError;

    /// Case-insensitive; model output is not consistent about casing.
    fn from_str(s: &str) -> DeskResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" => Ok(Sentiment::Positive),
            "neutral" => Ok(Sentiment::Neutral),
            "negative" => Ok(Sentiment::Negative),
            other => Err(DeskError::Validation(format!("Unknown sentiment: {other}"))),
        }
    }
}

/// Label recorded on a history entry. `Assigned` is an audit label only;
/// the complaint's status after an assignment is `InProgress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryLabel {
    Assigned,
    Resolved,
    Escalated,
}

impl HistoryLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            HistoryLabel::Assigned => "Assigned",
            HistoryLabel::Resolved => "Resolved",
            HistoryLabel::Escalated => "Escalated",
        }
    }
}

impl FromStr for HistoryLabel {
    type Err = DeskError;

    fn from_str(s: &str) -> DeskResult<Self> {
        match s {
            "Assigned" => Ok(HistoryLabel::Assigned),
            "Resolved" => Ok(HistoryLabel::Resolved),
            "Escalated" => Ok(HistoryLabel::Escalated),
            other => Err(DeskError::Validation(format!("Unknown history label: {other}"))),
        }
    }
}

// ── Records ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub status: HistoryLabel,
    pub comment: String,
    pub changed_by: Option<UserId>,
    pub changed_at: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Complaint {
    pub complaint_id: ComplaintId,
    pub org_id: OrgId,
    pub customer_name: String,
    pub customer_email: String,
    pub complaint: String,
    pub channel: Channel,
    #[serde(rename = "type")]
    pub complaint_type: String,
    pub issue: String,
    pub priority_score: u8,
    pub sentiment: Sentiment,
    pub status: ComplaintStatus,
    pub assigned_to: Option<AgentId>,
    pub reply: Option<String>,
    pub resolved_at: Option<Timestamp>,
    pub resolved_by: Option<UserId>,
    pub escalated: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// Optimistic concurrency token. Bumped by the store on every save.
    pub version: i64,
    pub history: Vec<HistoryEntry>,
}

/// Caller-supplied intake fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComplaintIntake {
    pub customer_name: String,
    pub customer_email: String,
    pub complaint: String,
    #[serde(default)]
    pub channel: Option<Channel>,
}

impl ComplaintIntake {
    pub fn validate(&self) -> DeskResult<()> {
        let blank = [&self.customer_name, &self.customer_email, &self.complaint]
            .iter()
            .any(|field| field.trim().is_empty());
        if blank {
            return Err(DeskError::Validation(
                "Name, email and complaint are required".into(),
            ));
        }
        Ok(())
    }
}

/// Narrowing applied to complaint listings. All set fields must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComplaintFilter {
    pub status: Option<ComplaintStatus>,
    pub priority_score: Option<u8>,
    pub complaint_type: Option<String>,
    pub escalated_only: bool,
}

/// A complaint together with the display names the directory resolved for it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplaintView {
    #[serde(flatten)]
    pub complaint: Complaint,
    pub assigned_agent_name: Option<String>,
    pub resolver_name: Option<String>,
}

// ── State machine ────────────────────────────────────────────────────────────

/// Every way a complaint's workflow state can change.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    AutoAssign { agent_id: AgentId },
    Assign { agent_id: AgentId, agent_name: String, by: UserId },
    Reply { reply: String, by: UserId },
    Resolve { comment: Option<String>, by: UserId },
    Escalate { reason: Option<String>, by: UserId },
}

impl Transition {
    /// Status the complaint holds after this transition.
    pub fn target(&self) -> ComplaintStatus {
        match self {
            Transition::AutoAssign { .. } | Transition::Assign { .. } => {
                ComplaintStatus::InProgress
            }
            Transition::Reply { .. } | Transition::Resolve { .. } => ComplaintStatus::Resolved,
            Transition::Escalate { .. } => ComplaintStatus::Escalated,
        }
    }

    pub fn label(&self) -> HistoryLabel {
        match self {
            Transition::AutoAssign { .. } | Transition::Assign { .. } => HistoryLabel::Assigned,
            Transition::Reply { .. } | Transition::Resolve { .. } => HistoryLabel::Resolved,
            Transition::Escalate { .. } => HistoryLabel::Escalated,
        }
    }

    fn comment(&self) -> String {
        match self {
            Transition::AutoAssign { .. } => AUTO_ASSIGN_COMMENT.to_string(),
            Transition::Assign { agent_name, .. } => format!("Assigned to {agent_name}"),
            Transition::Reply { .. } => REPLY_COMMENT.to_string(),
            Transition::Resolve { comment, .. } => non_blank(comment)
                .unwrap_or(DEFAULT_RESOLVE_COMMENT)
                .to_string(),
            Transition::Escalate { reason, .. } => non_blank(reason)
                .unwrap_or(DEFAULT_ESCALATE_COMMENT)
                .to_string(),
        }
    }

    fn changed_by(&self) -> Option<UserId> {
        match self {
            Transition::AutoAssign { .. } => None,
            Transition::Assign { by, .. }
            | Transition::Reply { by, .. }
            | Transition::Resolve { by, .. }
            | Transition::Escalate { by, .. } => Some(by.clone()),
        }
    }
}

fn non_blank(text: &Option<String>) -> Option<&str> {
    text.as_deref().map(str::trim).filter(|t| !t.is_empty())
}

impl Complaint {
    /// Build a fresh `Pending` complaint from validated intake and its classification.
    pub fn new(
        complaint_id: ComplaintId,
        org_id: OrgId,
        intake: ComplaintIntake,
        classification: Classification,
        now: Timestamp,
    ) -> Self {
        Self {
            complaint_id,
            org_id,
            customer_name: intake.customer_name.trim().to_string(),
            customer_email: intake.customer_email.trim().to_string(),
            complaint: intake.complaint,
            channel: intake.channel.unwrap_or_default(),
            complaint_type: classification.complaint_type,
            issue: classification.issue,
            priority_score: classification.priority_score,
            sentiment: classification.sentiment,
            status: ComplaintStatus::Pending,
            assigned_to: None,
            reply: None,
            resolved_at: None,
            resolved_by: None,
            escalated: false,
            created_at: now,
            updated_at: now,
            version: 0,
            history: Vec::new(),
        }
    }

    /// Apply one transition and append its history entry.
    ///
    /// The entry timestamp never goes backwards relative to the previous
    /// entry, even if the clock does.
    pub fn apply(&mut self, transition: Transition, now: Timestamp) -> &HistoryEntry {
        let at = match self.history.last() {
            Some(last) => now.max(last.changed_at),
            None => now.max(self.created_at),
        };

        self.status = transition.target();
        match &transition {
            Transition::AutoAssign { agent_id } | Transition::Assign { agent_id, .. } => {
                self.assigned_to = Some(agent_id.clone());
            }
            Transition::Reply { reply, by } => {
                self.reply = Some(reply.clone());
                self.resolved_at = Some(at);
                self.resolved_by = Some(by.clone());
            }
            Transition::Resolve { by, .. } => {
                self.resolved_at = Some(at);
                self.resolved_by = Some(by.clone());
            }
            Transition::Escalate { .. } => {
                self.escalated = true;
            }
        }
        self.updated_at = at;

        let idx = self.history.len();
        self.history.push(HistoryEntry {
            status: transition.label(),
            comment: transition.comment(),
            changed_by: transition.changed_by(),
            changed_at: at,
        });
        &self.history[idx]
    }
}
