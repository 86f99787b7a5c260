//! Shared primitive types used across the desk.

/// The tenant that owns complaints and agents. Every query is scoped by it.
pub type OrgId = String;

/// A stable, unique identifier for a complaint (UUID v4 text).
pub type ComplaintId = String;

/// Identifier of a staff member known to the agent directory.
pub type AgentId = String;

/// Identifier of the authenticated caller performing an operation.
pub type UserId = String;

/// Wall-clock instant used for every persisted timestamp.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
