//! Review findings tracked against the active workstream.
//!
//! These live inside the guard state. `staged_check` does not consult them;
//! they are surfaced through `status` and `review list`.

use crate::core::error::GuardError;
use crate::core::store::{GuardState, ReviewFinding, ReviewStatus, StateStore};
use crate::core::time;

pub const MAX_PRIORITY: u8 = 3;

pub fn add_finding(
    store: &StateStore,
    feature_id: &str,
    review_area: &str,
    title: &str,
    priority: u8,
) -> Result<String, GuardError> {
    if priority > MAX_PRIORITY {
        return Err(GuardError::ValidationError(format!(
            "priority must be 0..={}, got {}",
            MAX_PRIORITY, priority
        )));
    }
    if title.trim().is_empty() {
        return Err(GuardError::ValidationError(
            "review finding title must not be empty".to_string(),
        ));
    }

    let mut state = store.load();
    let id = time::new_event_id();
    state.findings.push(ReviewFinding {
        id: id.clone(),
        feature_id: feature_id.to_string(),
        review_area: review_area.to_string(),
        title: title.to_string(),
        priority,
        status: ReviewStatus::Open,
        created_at: time::now_rfc3339(),
        resolved_at: None,
        resolved_by: None,
    });
    store.save(&state)?;
    Ok(id)
}

pub fn resolve_finding(store: &StateStore, id: &str, resolver: &str) -> Result<(), GuardError> {
    let mut state = store.load();
    let finding = state
        .findings
        .iter_mut()
        .find(|f| f.id == id)
        .ok_or_else(|| GuardError::NotFound(format!("review finding '{}'", id)))?;
    finding.status = ReviewStatus::Resolved;
    finding.resolved_at = Some(time::now_rfc3339());
    finding.resolved_by = Some(resolver.to_string());
    store.save(&state)
}

pub fn set_in_progress(store: &StateStore, id: &str) -> Result<(), GuardError> {
    let mut state = store.load();
    let finding = state
        .findings
        .iter_mut()
        .find(|f| f.id == id)
        .ok_or_else(|| GuardError::NotFound(format!("review finding '{}'", id)))?;
    if finding.status == ReviewStatus::Resolved {
        return Err(GuardError::ValidationError(format!(
            "review finding '{}' is already resolved",
            id
        )));
    }
    finding.status = ReviewStatus::InProgress;
    store.save(&state)
}

pub fn blocking_findings(state: &GuardState) -> Vec<&ReviewFinding> {
    state.findings.iter().filter(|f| f.is_blocking()).collect()
}

pub fn finding_count(state: &GuardState) -> usize {
    state.findings.len()
}
