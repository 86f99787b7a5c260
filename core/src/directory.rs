//! Agent directory boundary.
//!
//! Staff accounts are owned by the user/organization service. The desk only
//! needs to look agents up and list assignment candidates, so it sees them
//! through `AgentDirectory`. `DeskStore` implements it over a local mirror.

use crate::{
    error::{DeskError, DeskResult},
    types::{AgentId, OrgId, UserId},
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Agent,
    User,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Agent => "Agent",
            Role::User => "User",
        }
    }
}

impl FromStr for Role {
    type Err = DeskError;

    fn from_str(s: &str) -> DeskResult<Self> {
        match s {
            "Admin" => Ok(Role::Admin),
            "Agent" => Ok(Role::Agent),
            "User" => Ok(Role::User),
            other => Err(DeskError::Validation(format!("Unknown role: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub agent_id: AgentId,
    pub org_id: OrgId,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// The authenticated caller. Role claims are trusted as given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActingUser {
    pub id: UserId,
    pub role: Role,
}

impl ActingUser {
    pub fn new(id: impl Into<UserId>, role: Role) -> Self {
        Self { id: id.into(), role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Fail with `Forbidden` unless the caller is an admin.
    pub fn require_admin(&self, action: &str) -> DeskResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(DeskError::Forbidden(format!(
                "Access denied. Only admins can {action}"
            )))
        }
    }
}

pub trait AgentDirectory {
    /// Staff of `org_id` holding `role`, in registration order.
    fn find_agents_by_role(&self, org_id: &str, role: Role) -> DeskResult<Vec<Agent>>;

    fn find_agent_by_id(&self, org_id: &str, agent_id: &str) -> DeskResult<Option<Agent>>;
}
