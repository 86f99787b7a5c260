//! Dashboard aggregation.
//!
//! Computed on demand from a full scan of the organization's complaints.
//! The numbers are a point-in-time snapshot: individual queries are not
//! isolated from concurrent writes, so counts may drift by in-flight requests.

use crate::{
    complaint::{ComplaintFilter, ComplaintStatus, ComplaintView},
    error::DeskResult,
    store::DeskStore,
};
use serde::Serialize;
use std::collections::BTreeMap;

pub const RECENT_COMPLAINTS: u32 = 5;
const MILLIS_PER_HOUR: f64 = 3_600_000.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub total: i64,
    pub pending: i64,
    pub in_progress: i64,
    pub resolved: i64,
    pub escalated: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PriorityBuckets {
    pub low: i64,
    pub medium: i64,
    pub high: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Performance {
    /// Mean hours from registration to resolution.
    pub average_response_time: f64,
    pub total_resolved: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub counts: StatusCounts,
    pub priority: PriorityBuckets,
    pub by_channel: BTreeMap<String, i64>,
    pub by_type: BTreeMap<String, i64>,
    pub performance: Performance,
    pub recent_complaints: Vec<ComplaintView>,
}

pub fn compute(store: &DeskStore, org_id: &str) -> DeskResult<DashboardStats> {
    let by_status = store.status_counts(org_id)?;
    let count = |status: ComplaintStatus| by_status.get(&status).copied().unwrap_or(0);
    let counts = StatusCounts {
        pending: count(ComplaintStatus::Pending),
        in_progress: count(ComplaintStatus::InProgress),
        resolved: count(ComplaintStatus::Resolved),
        escalated: count(ComplaintStatus::Escalated),
        total: ComplaintStatus::ALL.into_iter().map(count).sum(),
    };

    let (low, medium, high) = store.priority_buckets(org_id)?;
    let average_response_time = store
        .mean_resolution_millis(org_id)?
        .map(|ms| ms / MILLIS_PER_HOUR)
        .unwrap_or(0.0);

    let recent_complaints =
        store.list_complaints(org_id, &ComplaintFilter::default(), Some(RECENT_COMPLAINTS), 0)?;

    log::debug!(
        "org={org_id} dashboard: total={} resolved={} avg_hours={average_response_time:.2}",
        counts.total,
        counts.resolved,
    );

    Ok(DashboardStats {
        performance: Performance {
            average_response_time,
            total_resolved: counts.resolved,
        },
        counts,
        priority: PriorityBuckets { low, medium, high },
        by_channel: store.count_by_channel(org_id)?,
        by_type: store.count_by_type(org_id)?,
        recent_complaints,
    })
}
