use super::{from_millis, to_millis, DeskStore};
use crate::{
    complaint::{Complaint, ComplaintFilter, ComplaintStatus, ComplaintView, HistoryEntry},
    error::{DeskError, DeskResult},
};
use rusqlite::{params, params_from_iter, types::Value, Connection, OptionalExtension};
use std::collections::{BTreeMap, HashMap};

/// Result of a version-checked save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved { version: i64 },
    /// Another writer bumped the version first. Nothing was written.
    Stale,
}

const VIEW_COLUMNS: &str = "
    c.complaint_id, c.org_id, c.customer_name, c.customer_email, c.complaint_text,
    c.channel, c.complaint_type, c.issue, c.priority_score, c.sentiment, c.status,
    c.assigned_to, c.reply, c.resolved_at_ms, c.resolved_by, c.escalated,
    c.created_at_ms, c.updated_at_ms, c.version, assignee.name, resolver.name";

const VIEW_JOINS: &str = "
    FROM complaint c
    LEFT JOIN agent assignee ON assignee.org_id = c.org_id AND assignee.agent_id = c.assigned_to
    LEFT JOIN agent resolver ON resolver.org_id = c.org_id AND resolver.agent_id = c.resolved_by";

struct ComplaintRow {
    complaint_id: String,
    org_id: String,
    customer_name: String,
    customer_email: String,
    complaint: String,
    channel: String,
    complaint_type: String,
    issue: String,
    priority_score: i64,
    sentiment: String,
    status: String,
    assigned_to: Option<String>,
    reply: Option<String>,
    resolved_at_ms: Option<i64>,
    resolved_by: Option<String>,
    escalated: bool,
    created_at_ms: i64,
    updated_at_ms: i64,
    version: i64,
    assigned_agent_name: Option<String>,
    resolver_name: Option<String>,
}

// Helper function for mapping complaint rows
fn complaint_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<ComplaintRow> {
    Ok(ComplaintRow {
        complaint_id: row.get(0)?,
        org_id: row.get(1)?,
        customer_name: row.get(2)?,
        customer_email: row.get(3)?,
        complaint: row.get(4)?,
        channel: row.get(5)?,
        complaint_type: row.get(6)?,
        issue: row.get(7)?,
        priority_score: row.get(8)?,
        sentiment: row.get(9)?,
        status: row.get(10)?,
        assigned_to: row.get(11)?,
        reply: row.get(12)?,
        resolved_at_ms: row.get(13)?,
        resolved_by: row.get(14)?,
        escalated: row.get::<_, i32>(15)? != 0,
        created_at_ms: row.get(16)?,
        updated_at_ms: row.get(17)?,
        version: row.get(18)?,
        assigned_agent_name: row.get(19)?,
        resolver_name: row.get(20)?,
    })
}

impl ComplaintRow {
    fn into_view(self, history: Vec<HistoryEntry>) -> DeskResult<ComplaintView> {
        let priority_score = u8::try_from(self.priority_score).map_err(|_| {
            DeskError::Other(anyhow::anyhow!(
                "complaint {} has invalid priority {}",
                self.complaint_id,
                self.priority_score
            ))
        })?;
        let complaint = Complaint {
            complaint_id: self.complaint_id,
            org_id: self.org_id,
            customer_name: self.customer_name,
            customer_email: self.customer_email,
            complaint: self.complaint,
            channel: self.channel.parse()?,
            complaint_type: self.complaint_type,
            issue: self.issue,
            priority_score,
            sentiment: self.sentiment.parse()?,
            status: self.status.parse()?,
            assigned_to: self.assigned_to,
            reply: self.reply,
            resolved_at: self.resolved_at_ms.map(from_millis).transpose()?,
            resolved_by: self.resolved_by,
            escalated: self.escalated,
            created_at: from_millis(self.created_at_ms)?,
            updated_at: from_millis(self.updated_at_ms)?,
            version: self.version,
            history,
        };
        Ok(ComplaintView {
            complaint,
            assigned_agent_name: self.assigned_agent_name,
            resolver_name: self.resolver_name,
        })
    }
}

fn insert_history(
    conn: &Connection,
    complaint_id: &str,
    first_seq: usize,
    entries: &[HistoryEntry],
) -> DeskResult<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO complaint_history (complaint_id, seq, status, comment, changed_by, changed_at_ms)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for (offset, entry) in entries.iter().enumerate() {
        stmt.execute(params![
            complaint_id,
            (first_seq + offset) as i64,
            entry.status.as_str(),
            &entry.comment,
            entry.changed_by.as_deref(),
            to_millis(entry.changed_at),
        ])?;
    }
    Ok(())
}

/// WHERE clause (without the keyword) and its positional values.
fn filter_clause(org_id: &str, filter: &ComplaintFilter) -> (String, Vec<Value>) {
    let mut clause = String::from("c.org_id = ?");
    let mut values = vec![Value::Text(org_id.to_string())];
    if let Some(status) = filter.status {
        clause.push_str(" AND c.status = ?");
        values.push(Value::Text(status.as_str().to_string()));
    }
    if let Some(priority) = filter.priority_score {
        clause.push_str(" AND c.priority_score = ?");
        values.push(Value::Integer(i64::from(priority)));
    }
    if let Some(ref complaint_type) = filter.complaint_type {
        clause.push_str(" AND c.complaint_type = ?");
        values.push(Value::Text(complaint_type.clone()));
    }
    if filter.escalated_only {
        clause.push_str(" AND c.escalated = 1");
    }
    (clause, values)
}

impl DeskStore {
    // ── Complaint ──────────────────────────────────────────────────

    /// Insert a new complaint and any history it was created with, atomically.
    pub fn insert_complaint(&self, c: &Complaint) -> DeskResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO complaint (
                complaint_id, org_id, customer_name, customer_email, complaint_text,
                channel, complaint_type, issue, priority_score, sentiment, status,
                assigned_to, reply, resolved_at_ms, resolved_by, escalated,
                created_at_ms, updated_at_ms, version
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
            params![
                &c.complaint_id,
                &c.org_id,
                &c.customer_name,
                &c.customer_email,
                &c.complaint,
                c.channel.as_str(),
                &c.complaint_type,
                &c.issue,
                i64::from(c.priority_score),
                c.sentiment.as_str(),
                c.status.as_str(),
                c.assigned_to.as_deref(),
                c.reply.as_deref(),
                c.resolved_at.map(to_millis),
                c.resolved_by.as_deref(),
                if c.escalated { 1i32 } else { 0i32 },
                to_millis(c.created_at),
                to_millis(c.updated_at),
                c.version,
            ],
        )?;
        insert_history(&tx, &c.complaint_id, 0, &c.history)?;
        tx.commit()?;
        Ok(())
    }

    pub fn get_complaint(&self, org_id: &str, complaint_id: &str) -> DeskResult<Option<ComplaintView>> {
        let sql = format!("SELECT {VIEW_COLUMNS} {VIEW_JOINS} WHERE c.org_id = ?1 AND c.complaint_id = ?2");
        let row = self
            .conn
            .query_row(&sql, params![org_id, complaint_id], complaint_row_mapper)
            .optional()?;
        match row {
            Some(row) => {
                let history = self.complaint_history(&row.complaint_id)?;
                Ok(Some(row.into_view(history)?))
            }
            None => Ok(None),
        }
    }

    /// Persist workflow fields and append new history entries, but only if
    /// the stored version still equals `expected_version`.
    ///
    /// `persisted_history` is how many of `c.history` were already stored;
    /// only the entries after it are inserted.
    pub fn save_complaint(
        &self,
        c: &Complaint,
        expected_version: i64,
        persisted_history: usize,
    ) -> DeskResult<SaveOutcome> {
        let new_entries = c.history.get(persisted_history..).ok_or_else(|| {
            DeskError::Other(anyhow::anyhow!(
                "complaint {} has {} history entries, {} claimed persisted",
                c.complaint_id,
                c.history.len(),
                persisted_history
            ))
        })?;

        let tx = self.conn.unchecked_transaction()?;
        let changed = tx.execute(
            "UPDATE complaint SET
                status = ?1, assigned_to = ?2, reply = ?3, resolved_at_ms = ?4,
                resolved_by = ?5, escalated = ?6, updated_at_ms = ?7, version = version + 1
             WHERE org_id = ?8 AND complaint_id = ?9 AND version = ?10",
            params![
                c.status.as_str(),
                c.assigned_to.as_deref(),
                c.reply.as_deref(),
                c.resolved_at.map(to_millis),
                c.resolved_by.as_deref(),
                if c.escalated { 1i32 } else { 0i32 },
                to_millis(c.updated_at),
                &c.org_id,
                &c.complaint_id,
                expected_version,
            ],
        )?;
        if changed == 0 {
            // Dropping the transaction rolls it back.
            return Ok(SaveOutcome::Stale);
        }
        insert_history(&tx, &c.complaint_id, persisted_history, new_entries)?;
        tx.commit()?;
        Ok(SaveOutcome::Saved {
            version: expected_version + 1,
        })
    }

    pub fn complaint_history(&self, complaint_id: &str) -> DeskResult<Vec<HistoryEntry>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT status, comment, changed_by, changed_at_ms
             FROM complaint_history WHERE complaint_id = ?1
             ORDER BY seq ASC",
        )?;
        let rows = stmt.query_map(params![complaint_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;
        let mut history = Vec::new();
        for row in rows {
            let (status, comment, changed_by, changed_at_ms) = row?;
            history.push(HistoryEntry {
                status: status.parse()?,
                comment,
                changed_by,
                changed_at: from_millis(changed_at_ms)?,
            });
        }
        Ok(history)
    }

    /// Complaints matching `filter`, newest first. `None` returns every match.
    pub fn list_complaints(
        &self,
        org_id: &str,
        filter: &ComplaintFilter,
        limit: Option<u32>,
        offset: u64,
    ) -> DeskResult<Vec<ComplaintView>> {
        let (clause, mut values) = filter_clause(org_id, filter);
        // SQLite treats a negative LIMIT as no limit.
        values.push(Value::Integer(limit.map_or(-1, i64::from)));
        values.push(Value::Integer(offset as i64));
        let sql = format!(
            "SELECT {VIEW_COLUMNS} {VIEW_JOINS} WHERE {clause}
             ORDER BY c.created_at_ms DESC, c.rowid DESC
             LIMIT ? OFFSET ?"
        );
        let rows = {
            let mut stmt = self.conn.prepare(&sql)?;
            let mapped = stmt.query_map(params_from_iter(values), complaint_row_mapper)?;
            mapped.collect::<Result<Vec<_>, _>>()?
        };
        rows.into_iter()
            .map(|row| {
                let history = self.complaint_history(&row.complaint_id)?;
                row.into_view(history)
            })
            .collect()
    }

    pub fn count_complaints(&self, org_id: &str, filter: &ComplaintFilter) -> DeskResult<i64> {
        let (clause, values) = filter_clause(org_id, filter);
        let sql = format!("SELECT COUNT(*) FROM complaint c WHERE {clause}");
        Ok(self
            .conn
            .query_row(&sql, params_from_iter(values), |row| row.get(0))?)
    }

    // ── Dashboard aggregates ───────────────────────────────────────

    pub fn status_counts(&self, org_id: &str) -> DeskResult<HashMap<ComplaintStatus, i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT status, COUNT(*) FROM complaint WHERE org_id = ?1 GROUP BY status",
        )?;
        let rows = stmt.query_map(params![org_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        let mut counts = HashMap::new();
        for row in rows {
            let (status, count) = row?;
            counts.insert(status.parse::<ComplaintStatus>()?, count);
        }
        Ok(counts)
    }

    /// (low ≤ 2, medium = 3, high ≥ 4)
    pub fn priority_buckets(&self, org_id: &str) -> DeskResult<(i64, i64, i64)> {
        Ok(self.conn.query_row(
            "SELECT
                COALESCE(SUM(CASE WHEN priority_score <= 2 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN priority_score = 3 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN priority_score >= 4 THEN 1 ELSE 0 END), 0)
             FROM complaint WHERE org_id = ?1",
            params![org_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?)
    }

    pub fn count_by_channel(&self, org_id: &str) -> DeskResult<BTreeMap<String, i64>> {
        self.grouped_count(
            "SELECT channel, COUNT(*) FROM complaint WHERE org_id = ?1 GROUP BY channel",
            org_id,
        )
    }

    pub fn count_by_type(&self, org_id: &str) -> DeskResult<BTreeMap<String, i64>> {
        self.grouped_count(
            "SELECT complaint_type, COUNT(*) FROM complaint WHERE org_id = ?1 GROUP BY complaint_type",
            org_id,
        )
    }

    fn grouped_count(&self, sql: &str, org_id: &str) -> DeskResult<BTreeMap<String, i64>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params![org_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        rows.collect::<Result<BTreeMap<_, _>, _>>().map_err(Into::into)
    }

    /// Mean of resolved_at − created_at in milliseconds over complaints that
    /// have a resolution timestamp. `None` when there are none.
    pub fn mean_resolution_millis(&self, org_id: &str) -> DeskResult<Option<f64>> {
        Ok(self.conn.query_row(
            "SELECT AVG(resolved_at_ms - created_at_ms) FROM complaint
             WHERE org_id = ?1 AND resolved_at_ms IS NOT NULL",
            params![org_id],
            |row| row.get(0),
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Classification;
    use crate::complaint::{ComplaintIntake, Transition};
    use chrono::{TimeZone, Utc};

    fn store() -> DeskStore {
        let store = DeskStore::in_memory().expect("in-memory store");
        store.migrate().expect("migration");
        store
    }

    fn sample(id: &str) -> Complaint {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let intake = ComplaintIntake {
            customer_name: "Mei".into(),
            customer_email: "mei@example.com".into(),
            complaint: "Charged twice".into(),
            channel: None,
        };
        Complaint::new(id.into(), "org-a".into(), intake, Classification::default(), now)
    }

    #[test]
    fn stale_version_is_not_written() {
        let store = store();
        let mut c = sample("c-1");
        store.insert_complaint(&c).unwrap();

        let now = c.created_at;
        c.apply(Transition::Resolve { comment: None, by: "u1".into() }, now);
        assert_eq!(store.save_complaint(&c, 0, 0).unwrap(), SaveOutcome::Saved { version: 1 });

        // A second writer still holding version 0 loses.
        let mut stale = sample("c-1");
        stale.apply(Transition::Escalate { reason: None, by: "admin".into() }, now);
        assert_eq!(store.save_complaint(&stale, 0, 0).unwrap(), SaveOutcome::Stale);

        let stored = store.get_complaint("org-a", "c-1").unwrap().unwrap().complaint;
        assert_eq!(stored.status, ComplaintStatus::Resolved);
        assert_eq!(stored.version, 1);
        assert_eq!(stored.history.len(), 1, "stale save must not append history");
    }

    #[test]
    fn history_rows_cannot_be_updated_or_deleted() {
        let store = store();
        let mut c = sample("c-2");
        let now = c.created_at;
        c.apply(Transition::AutoAssign { agent_id: "a1".into() }, now);
        store.insert_complaint(&c).unwrap();

        let update = store
            .conn
            .execute("UPDATE complaint_history SET comment = 'rewritten'", []);
        assert!(update.is_err());
        let delete = store.conn.execute("DELETE FROM complaint_history", []);
        assert!(delete.is_err());
        assert_eq!(store.complaint_history("c-2").unwrap().len(), 1);
    }

    #[test]
    fn duplicate_id_is_a_conflict() {
        let store = store();
        let c = sample("c-3");
        store.insert_complaint(&c).unwrap();
        let err = store.insert_complaint(&c).unwrap_err();
        assert_eq!(err.status_code(), 409);
    }

    #[test]
    fn other_orgs_rows_are_invisible() {
        let store = store();
        store.insert_complaint(&sample("c-4")).unwrap();
        assert!(store.get_complaint("org-b", "c-4").unwrap().is_none());
        assert_eq!(store.count_complaints("org-b", &ComplaintFilter::default()).unwrap(), 0);
        assert_eq!(store.count_complaints("org-a", &ComplaintFilter::default()).unwrap(), 1);
    }
}
