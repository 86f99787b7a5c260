//! Complaint intake and triage engine.
//!
//! Complaints are classified on intake, auto-assigned when urgent, and moved
//! through their lifecycle by operators. Every organization's data is scoped
//! by `org_id`; nothing crosses tenants.

pub mod assignment;
pub mod classifier;
pub mod clock;
pub mod complaint;
pub mod config;
pub mod dashboard;
pub mod desk;
pub mod directory;
pub mod error;
pub mod store;
pub mod types;

pub use desk::ComplaintDesk;
pub use error::{DeskError, DeskResult};
