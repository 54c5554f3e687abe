//! Counters for access decisions, compiled filters and group resolution.
//!
//! The library only records through the `metrics` facade. Installing an
//! exporter (Prometheus or otherwise) is left to the host process.
//!
//! # Example
//!
//! ```rust,no_run
//! use sharing_core::telemetry::metrics::{AccessDecisionCounter, describe_metrics};
//!
//! describe_metrics();
//! AccessDecisionCounter::increment("ownership", "read");
//! ```

use metrics::{counter, describe_counter};

/// Register descriptions for every counter the engine emits.
pub fn describe_metrics() {
    describe_counter!(
        "sharing_access_decisions_total",
        "Record access decisions by grant source or deny reason"
    );
    describe_counter!(
        "sharing_filters_built_total",
        "Sharing filters compiled for list queries, by outcome"
    );
    describe_counter!(
        "sharing_group_resolutions_total",
        "Group closure resolutions, by direction"
    );
    describe_counter!(
        "sharing_group_depth_truncations_total",
        "Upward group resolutions stopped by the depth bound"
    );
    describe_counter!("sharing_errors_total", "Errors raised by the sharing engine");
}

/// Counts `can_access` outcomes.
pub struct AccessDecisionCounter;

impl AccessDecisionCounter {
    pub fn increment(outcome: &str, access: &str) {
        counter!(
            "sharing_access_decisions_total",
            "outcome" => outcome.to_string(),
            "access" => access.to_string(),
        )
        .increment(1);
    }
}

/// Counts compiled list filters.
pub struct FilterCounter;

impl FilterCounter {
    /// `kind` is one of `unrestricted`, `restricted`, `match_nothing`.
    pub fn increment(kind: &'static str) {
        counter!("sharing_filters_built_total", "kind" => kind).increment(1);
    }
}

/// Counts group closure resolutions.
pub struct GroupResolutionCounter;

impl GroupResolutionCounter {
    /// `direction` is `up` (user → groups) or `down` (group → users).
    pub fn increment(direction: &'static str) {
        counter!("sharing_group_resolutions_total", "direction" => direction).increment(1);
    }

    pub fn depth_truncated() {
        counter!("sharing_group_depth_truncations_total").increment(1);
    }
}
