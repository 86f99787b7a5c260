//! Agent directory mirror and load index queries.

use super::DeskStore;
use crate::{
    assignment::{AgentLoad, AgentLoadIndex},
    complaint::ComplaintStatus,
    directory::{Agent, AgentDirectory, Role},
    error::DeskResult,
};
use rusqlite::{params, OptionalExtension};

struct AgentRow {
    agent_id: String,
    org_id: String,
    name: String,
    email: String,
    role: String,
}

impl AgentRow {
    fn into_agent(self) -> DeskResult<Agent> {
        Ok(Agent {
            agent_id: self.agent_id,
            org_id: self.org_id,
            name: self.name,
            email: self.email,
            role: self.role.parse()?,
        })
    }
}

fn agent_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<AgentRow> {
    Ok(AgentRow {
        agent_id: row.get(0)?,
        org_id: row.get(1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        role: row.get(4)?,
    })
}

impl DeskStore {
    // ── Agent mirror ───────────────────────────────────────────────

    /// Insert or refresh a directory entry. Registration order (rowid) is
    /// kept on refresh so tie-breaking stays stable.
    pub fn upsert_agent(&self, agent: &Agent) -> DeskResult<()> {
        self.conn.execute(
            "INSERT INTO agent (org_id, agent_id, name, email, role)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(org_id, agent_id) DO UPDATE SET
                name = excluded.name, email = excluded.email, role = excluded.role",
            params![
                &agent.org_id,
                &agent.agent_id,
                &agent.name,
                &agent.email,
                agent.role.as_str(),
            ],
        )?;
        Ok(())
    }

    pub fn agent_count(&self, org_id: &str) -> DeskResult<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM agent WHERE org_id = ?1",
            params![org_id],
            |row| row.get(0),
        )?)
    }
}

impl AgentDirectory for DeskStore {
    fn find_agents_by_role(&self, org_id: &str, role: Role) -> DeskResult<Vec<Agent>> {
        let mut stmt = self.conn.prepare(
            "SELECT agent_id, org_id, name, email, role
             FROM agent WHERE org_id = ?1 AND role = ?2
             ORDER BY rowid ASC",
        )?;
        let rows = stmt.query_map(params![org_id, role.as_str()], agent_row_mapper)?;
        let mut agents = Vec::new();
        for row in rows {
            agents.push(row?.into_agent()?);
        }
        Ok(agents)
    }

    fn find_agent_by_id(&self, org_id: &str, agent_id: &str) -> DeskResult<Option<Agent>> {
        self.conn
            .query_row(
                "SELECT agent_id, org_id, name, email, role
                 FROM agent WHERE org_id = ?1 AND agent_id = ?2",
                params![org_id, agent_id],
                agent_row_mapper,
            )
            .optional()?
            .map(AgentRow::into_agent)
            .transpose()
    }
}

impl AgentLoadIndex for DeskStore {
    fn active_loads(&self, org_id: &str, agents: &[Agent]) -> DeskResult<Vec<AgentLoad>> {
        let mut stmt = self.conn.prepare(
            "SELECT COUNT(*) FROM complaint
             WHERE org_id = ?1 AND assigned_to = ?2 AND status IN (?3, ?4)",
        )?;
        let mut loads = Vec::with_capacity(agents.len());
        for agent in agents {
            let active: i64 = stmt.query_row(
                params![
                    org_id,
                    &agent.agent_id,
                    ComplaintStatus::Pending.as_str(),
                    ComplaintStatus::InProgress.as_str(),
                ],
                |row| row.get(0),
            )?;
            loads.push(AgentLoad {
                agent_id: agent.agent_id.clone(),
                name: agent.name.clone(),
                active,
            });
        }
        Ok(loads)
    }
}
