//! Complaint lifecycle: intake, operator actions, and the history trail.

mod common;

use chrono::Duration;
use common::*;
use complaint_desk_core::{
    complaint::{
        Channel, ComplaintStatus, HistoryLabel, AUTO_ASSIGN_COMMENT, DEFAULT_ESCALATE_COMMENT,
        DEFAULT_RESOLVE_COMMENT, REPLY_COMMENT,
    },
    desk::ComplaintDesk,
    directory::Role,
    error::ErrorKind,
};

/// A priority-5 complaint with one idle agent lands with that agent.
#[test]
fn urgent_complaint_is_auto_assigned_to_idle_agent() {
    let desk = ComplaintDesk::build_test(fraud(5)).unwrap();
    add_staff(&desk, "agent-a", "Ana", Role::Agent);

    let c = desk.register(intake("Someone used my card abroad")).unwrap();

    assert_eq!(c.assigned_to.as_deref(), Some("agent-a"));
    assert_eq!(c.status, ComplaintStatus::InProgress);
    assert_eq!(c.complaint_type, "Fraud");
    assert_eq!(c.history.len(), 1);
    assert_eq!(c.history[0].status, HistoryLabel::Assigned);
    assert_eq!(c.history[0].comment, AUTO_ASSIGN_COMMENT);
    assert_eq!(c.history[0].changed_by, None);

    let stored = desk.get(&c.complaint_id).unwrap();
    assert_eq!(stored.complaint.status, ComplaintStatus::InProgress);
    assert_eq!(stored.assigned_agent_name.as_deref(), Some("Ana"));
    assert_eq!(stored.complaint.history, c.history);
}

/// Without any agents an urgent complaint stays pending with no history.
#[test]
fn urgent_complaint_without_agents_stays_pending() {
    let desk = ComplaintDesk::build_test(fraud(5)).unwrap();

    let c = desk.register(intake("Someone used my card abroad")).unwrap();

    assert_eq!(c.status, ComplaintStatus::Pending);
    assert_eq!(c.assigned_to, None);
    assert!(c.history.is_empty());
    assert_eq!(desk.get(&c.complaint_id).unwrap().complaint.status, ComplaintStatus::Pending);
}

/// Admins are not assignment candidates.
#[test]
fn admins_are_never_auto_assigned() {
    let desk = ComplaintDesk::build_test(fraud(5)).unwrap();
    add_staff(&desk, "admin-1", "Kim", Role::Admin);

    let c = desk.register(intake("Someone used my card abroad")).unwrap();
    assert_eq!(c.assigned_to, None);
    assert_eq!(c.status, ComplaintStatus::Pending);
}

#[test]
fn blank_intake_fields_are_rejected() {
    let desk = marker_desk();
    let mut blank_email = intake("Late delivery");
    blank_email.customer_email = "   ".into();

    let err = desk.register(blank_email).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.status_code(), 400);
    assert_eq!(desk.dashboard().unwrap().counts.total, 0);
}

#[test]
fn channel_defaults_to_web_and_is_kept_when_given() {
    let desk = marker_desk();
    let web = desk.register(intake("Late delivery")).unwrap();
    assert_eq!(web.channel, Channel::Web);

    let mut chat = intake("Rude support");
    chat.channel = Some(Channel::LiveChat);
    let chat = desk.register(chat).unwrap();
    assert_eq!(desk.get(&chat.complaint_id).unwrap().complaint.channel, Channel::LiveChat);
}

/// A non-admin escalation is refused and leaves the complaint untouched.
#[test]
fn non_admin_cannot_escalate() {
    let desk = marker_desk();
    let c = desk.register(intake("P2: Wrong invoice")).unwrap();

    let err = desk.escalate(&c.complaint_id, Some("angry"), &operator()).unwrap_err();
    assert_eq!(err.status_code(), 403);

    let stored = desk.get(&c.complaint_id).unwrap().complaint;
    assert_eq!(stored.status, ComplaintStatus::Pending);
    assert!(!stored.escalated);
    assert!(stored.history.is_empty());
    assert_eq!(stored.version, c.version);
}

/// Authorization is checked before the complaint is looked up.
#[test]
fn non_admin_escalating_missing_complaint_is_forbidden() {
    let desk = marker_desk();
    let err = desk.escalate("no-such-id", None, &operator()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}

#[test]
fn admin_escalation_sets_flag_and_default_comment() {
    let desk = marker_desk();
    let c = desk.register(intake("P2: Wrong invoice")).unwrap();

    let escalated = desk.escalate(&c.complaint_id, None, &admin()).unwrap();
    assert_eq!(escalated.status, ComplaintStatus::Escalated);
    assert!(escalated.escalated);
    let last = escalated.history.last().unwrap();
    assert_eq!(last.status, HistoryLabel::Escalated);
    assert_eq!(last.comment, DEFAULT_ESCALATE_COMMENT);
    assert_eq!(last.changed_by.as_deref(), Some("admin-1"));
}

/// Escalation does not lock the complaint: it can still be resolved, and the
/// escalated flag survives resolution.
#[test]
fn escalated_complaint_can_still_be_resolved() {
    let desk = marker_desk();
    let c = desk.register(intake("P2: Wrong invoice")).unwrap();
    desk.escalate(&c.complaint_id, Some("VIP customer"), &admin()).unwrap();

    let resolved = desk.mark_resolved(&c.complaint_id, None, &operator()).unwrap();
    assert_eq!(resolved.status, ComplaintStatus::Resolved);
    assert!(resolved.escalated);
    assert_eq!(resolved.history.len(), 2);
    assert_eq!(resolved.history[0].comment, "VIP customer");

    let again = desk.escalate(&c.complaint_id, None, &admin()).unwrap();
    assert_eq!(again.status, ComplaintStatus::Escalated);
    assert_eq!(again.history.len(), 3);
}

#[test]
fn manual_assignment_moves_to_in_progress() {
    let desk = marker_desk();
    add_staff(&desk, "agent-b", "Bo", Role::Agent);
    let c = desk.register(intake("P2: Wrong invoice")).unwrap();

    let assigned = desk.assign(&c.complaint_id, "agent-b", &admin()).unwrap();
    assert_eq!(assigned.status, ComplaintStatus::InProgress);
    assert_eq!(assigned.assigned_to.as_deref(), Some("agent-b"));
    let last = assigned.history.last().unwrap();
    assert_eq!(last.status, HistoryLabel::Assigned);
    assert_eq!(last.comment, "Assigned to Bo");
    assert_eq!(last.changed_by.as_deref(), Some("admin-1"));
}

#[test]
fn assignment_reports_which_record_is_missing() {
    let desk = marker_desk();
    add_staff(&desk, "agent-b", "Bo", Role::Agent);
    let c = desk.register(intake("P2: Wrong invoice")).unwrap();

    let missing_complaint = desk.assign("nope", "agent-b", &admin()).unwrap_err();
    assert_eq!(missing_complaint.status_code(), 404);
    assert!(missing_complaint.to_string().contains("Complaint"));

    let missing_agent = desk.assign(&c.complaint_id, "ghost", &admin()).unwrap_err();
    assert_eq!(missing_agent.status_code(), 404);
    assert!(missing_agent.to_string().contains("Agent"));

    let stored = desk.get(&c.complaint_id).unwrap().complaint;
    assert_eq!(stored.status, ComplaintStatus::Pending);
    assert!(stored.history.is_empty());
}

#[test]
fn reply_resolves_and_records_resolver() {
    let desk = marker_desk();
    add_staff(&desk, "agent-op", "Olu", Role::Agent);
    let c = desk.register(intake("P2: Wrong invoice")).unwrap();

    let replied = desk
        .add_reply(&c.complaint_id, "We have refunded the difference.", &operator())
        .unwrap();
    assert_eq!(replied.status, ComplaintStatus::Resolved);
    assert_eq!(replied.reply.as_deref(), Some("We have refunded the difference."));
    assert_eq!(replied.resolved_by.as_deref(), Some("agent-op"));
    assert!(replied.resolved_at.is_some());
    assert_eq!(replied.history.last().unwrap().comment, REPLY_COMMENT);

    let view = desk.get(&c.complaint_id).unwrap();
    assert_eq!(view.resolver_name.as_deref(), Some("Olu"));
    assert_eq!(view.complaint.resolved_at, replied.resolved_at);
}

/// Empty replies are rejected even when the complaint does not exist.
#[test]
fn blank_reply_is_a_validation_error() {
    let desk = marker_desk();
    let c = desk.register(intake("P2: Wrong invoice")).unwrap();

    let err = desk.add_reply(&c.complaint_id, "  ", &operator()).unwrap_err();
    assert_eq!(err.status_code(), 400);
    let err = desk.add_reply("missing", "", &operator()).unwrap_err();
    assert_eq!(err.status_code(), 400);

    let err = desk.add_reply("missing", "hello", &operator()).unwrap_err();
    assert_eq!(err.status_code(), 404);
}

/// Resolving twice succeeds, overwrites the resolver, and appends one entry.
#[test]
fn resolving_twice_overwrites_resolver() {
    let (desk, clock) = marker_desk_with_clock();
    let c = desk.register(intake("P2: Wrong invoice")).unwrap();

    clock.advance(Duration::minutes(10));
    let first = desk.mark_resolved(&c.complaint_id, Some("fixed"), &operator()).unwrap();
    clock.advance(Duration::minutes(10));
    let second = desk.mark_resolved(&c.complaint_id, None, &admin()).unwrap();

    assert_eq!(second.history.len(), first.history.len() + 1);
    assert_eq!(second.resolved_by.as_deref(), Some("admin-1"));
    assert!(second.resolved_at > first.resolved_at);
    assert_eq!(second.history[0].comment, "fixed");
    assert_eq!(second.history[1].comment, DEFAULT_RESOLVE_COMMENT);
}

/// Every resolved complaint carries a resolver and a resolution time.
#[test]
fn resolved_status_implies_resolver_and_time() {
    let desk = marker_desk();
    let a = desk.register(intake("P2: one")).unwrap();
    let b = desk.register(intake("P2: two")).unwrap();
    desk.add_reply(&a.complaint_id, "done", &operator()).unwrap();
    desk.mark_resolved(&b.complaint_id, None, &admin()).unwrap();

    for view in desk.list(&Default::default()).unwrap().complaints {
        let c = view.complaint;
        if c.status == ComplaintStatus::Resolved {
            assert!(c.resolved_at.is_some(), "{} has no resolved_at", c.complaint_id);
            assert!(c.resolved_by.is_some(), "{} has no resolved_by", c.complaint_id);
        }
    }
}

/// History timestamps never go backwards, even when the clock does.
#[test]
fn history_timestamps_are_non_decreasing() {
    let (desk, clock) = marker_desk_with_clock();
    add_staff(&desk, "agent-b", "Bo", Role::Agent);
    let c = desk.register(intake("P2: Wrong invoice")).unwrap();

    clock.advance(Duration::hours(1));
    desk.assign(&c.complaint_id, "agent-b", &admin()).unwrap();
    clock.set(start_time() - Duration::hours(5));
    desk.escalate(&c.complaint_id, None, &admin()).unwrap();
    clock.advance(Duration::hours(10));
    let done = desk.mark_resolved(&c.complaint_id, None, &admin()).unwrap();

    assert_eq!(done.history.len(), 3);
    for pair in done.history.windows(2) {
        assert!(pair[0].changed_at <= pair[1].changed_at);
    }
    assert!(done.history[0].changed_at >= done.created_at);
}

/// Each successful mutation bumps the stored version by exactly one.
#[test]
fn versions_increase_per_mutation() {
    let desk = marker_desk();
    let c = desk.register(intake("P2: Wrong invoice")).unwrap();
    assert_eq!(c.version, 0);

    let v1 = desk.escalate(&c.complaint_id, None, &admin()).unwrap();
    let v2 = desk.mark_resolved(&c.complaint_id, None, &admin()).unwrap();
    assert_eq!(v1.version, 1);
    assert_eq!(v2.version, 2);
    assert_eq!(desk.get(&c.complaint_id).unwrap().complaint.version, 2);
}

#[test]
fn unknown_id_is_not_found() {
    let desk = marker_desk();
    let err = desk.get("does-not-exist").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(desk.mark_resolved("does-not-exist", None, &admin()).unwrap_err().status_code(), 404);
}
