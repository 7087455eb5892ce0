//! Shared timestamp/event helpers.
//!
//! Every timestamp this crate writes is RFC 3339 in UTC. Expiry fields read
//! from policy files additionally accept a bare `YYYY-MM-DD` date.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde_json::Value as JsonValue;
use ulid::Ulid;

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Formats `ts` as RFC 3339 with second precision (e.g. `2026-10-17T08:30:00Z`).
pub fn rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

pub fn now_rfc3339() -> String {
    rfc3339(now())
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

/// Parses an `expires_at` value into the first instant at which it is no
/// longer valid. A bare date stays valid through the end of that UTC day.
pub fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Some(ts) = parse_timestamp(raw) {
        return Some(ts);
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    let midnight = date.and_hms_opt(0, 0, 0)?.and_utc();
    Some(midnight + Duration::days(1))
}

/// Expiry check shared by exceptions and approvals.
///
/// Empty means "never expires". Anything unparsable is treated as expired.
pub fn is_expired_at(expires_at: &str, now: DateTime<Utc>) -> bool {
    if expires_at.trim().is_empty() {
        return false;
    }
    match parse_expiry(expires_at) {
        Some(deadline) => now >= deadline,
        None => true,
    }
}

pub fn new_event_id() -> String {
    Ulid::new().to_string()
}

/// Standard command response envelope shape used across CLI surfaces.
pub fn command_envelope(cmd: &str, status: &str, extra: JsonValue) -> JsonValue {
    let mut base = serde_json::json!({
        "envelope_version": "1.0.0",
        "ts": now_rfc3339(),
        "event_id": new_event_id(),
        "cmd": cmd,
        "status": status
    });
    if let (Some(base_obj), Some(extra_obj)) = (base.as_object_mut(), extra.as_object()) {
        for (k, v) in extra_obj {
            base_obj.insert(k.clone(), v.clone());
        }
    }
    base
}
