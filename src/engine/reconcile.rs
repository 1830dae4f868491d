//! Grace-period reconciliation and the notification gate.

use crate::config::{Monitor, NotificationPolicy};
use crate::db::{MonitorState, Status};
use crate::probe::CheckResult;

/// Fallback `last_error` for a DOWN result that carried no message.
const UNSPECIFIED_FAILURE: &str = "Check failed";

/// Compute the next persisted state from the prior state and a raw probe result.
///
/// A DOWN result keeps the prior visible status while the failure streak is
/// shorter than `monitor.grace_period`, unless there is no prior state or the
/// monitor is already DOWN.
pub fn reconcile(
    monitor: &Monitor,
    prior: Option<&MonitorState>,
    result: &CheckResult,
    now: i64,
) -> MonitorState {
    let (status, fail_count, first_fail_time, last_error) = match result.status {
        Status::Down => {
            let fail_count = prior.map_or(0, |p| p.fail_count).saturating_add(1);
            let first_fail_time = prior.and_then(|p| p.first_fail_time).or(Some(now));
            let status = match prior {
                Some(p) if fail_count < monitor.grace_period && p.status != Status::Down => p.status,
                _ => Status::Down,
            };
            let last_error = result
                .message
                .clone()
                .unwrap_or_else(|| UNSPECIFIED_FAILURE.to_string());
            (status, fail_count, first_fail_time, Some(last_error))
        }
        raw => (raw, 0, None, None),
    };

    MonitorState {
        monitor_id: monitor.id.clone(),
        status,
        last_checked_at: now,
        last_latency: result.latency,
        fail_count,
        first_fail_time,
        last_error,
    }
}

/// Whether a change from `prior` to `next` should be announced.
pub fn should_notify(policy: NotificationPolicy, prior: Option<Status>, next: Status) -> bool {
    match prior {
        Some(prev) if prev != next => match policy {
            NotificationPolicy::EveryTransition => true,
            NotificationPolicy::DownOnly => next == Status::Down,
        },
        _ => false,
    }
}
