//! Concrete commands and their handlers.
//!
//! Alias table (CLI name → handler):
//!   seed-scenario      → SeedScenarioHandler
//!   verify-scenario    → VerifyScenarioHandler
//!   reset-tenant       → ResetTenantHandler::soft
//!   reset-tenant-hard  → ResetTenantHandler::hard
//!   get-metrics        → GetMetricsHandler
//!   preflight          → PreflightHandler
//!   bootstrap-tenant   → BootstrapTenantHandler

pub mod bootstrap_tenant;
pub mod get_metrics;
pub mod preflight;
pub mod reset_tenant;
pub mod seed_scenario;
pub mod verify_scenario;

pub use bootstrap_tenant::{BootstrapOutcome, BootstrapTenantCommand, BootstrapTenantHandler};
pub use get_metrics::{GetMetricsCommand, GetMetricsHandler, MetricsSummary};
pub use preflight::{PreflightCommand, PreflightHandler, PreflightReport};
pub use reset_tenant::{ResetOutcome, ResetTenantCommand, ResetTenantHandler};
pub use seed_scenario::{SeedMode, SeedOutcome, SeedScenarioCommand, SeedScenarioHandler};
pub use verify_scenario::{VerifyScenarioCommand, VerifyScenarioHandler};

use crate::{
    error::{SimError, SimResult},
    types::Platform,
};

pub const MAX_DAYS: i64 = 365;

pub(crate) fn require_id(field: &str, value: &str) -> SimResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SimError::validation(field, "is required"));
    }
    if trimmed.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return Err(SimError::validation(field, "must not contain whitespace"));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn validate_days(days: i64) -> SimResult<u32> {
    if days <= 0 {
        return Err(SimError::validation("days", format!("must be positive, got {days}")));
    }
    if days > MAX_DAYS {
        return Err(SimError::validation("days", format!("must be at most {MAX_DAYS}, got {days}")));
    }
    Ok(days as u32)
}

/// Parse and de-duplicate platform names, keeping first-seen order.
pub(crate) fn parse_platforms(raw: &[String]) -> SimResult<Vec<Platform>> {
    let mut out: Vec<Platform> = Vec::with_capacity(raw.len());
    for name in raw {
        let p = name
            .parse::<Platform>()
            .map_err(|e| SimError::validation("platforms", e))?;
        if !out.contains(&p) {
            out.push(p);
        }
    }
    Ok(out)
}

/// Two-flag gate for anything that writes: a live run needs
/// `confirm_write` as well.
pub(crate) fn require_confirmation(operation: &str, dry_run: bool, confirm_write: bool) -> SimResult<()> {
    if !dry_run && !confirm_write {
        return Err(SimError::destructive_guard(
            operation,
            "dry_run=false requires confirm_write=true",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn days_bounds() {
        assert!(validate_days(0).is_err());
        assert!(validate_days(-3).is_err());
        assert!(validate_days(366).is_err());
        assert_eq!(validate_days(365).unwrap(), 365);
        assert_eq!(validate_days(1).unwrap(), 1);
    }

    #[test]
    fn confirmation_only_needed_for_live_runs() {
        assert!(require_confirmation("seed", true, false).is_ok());
        assert!(require_confirmation("seed", false, true).is_ok());
        let err = require_confirmation("seed", false, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DestructiveGuard);
    }

    #[test]
    fn platforms_are_deduplicated() {
        let parsed = parse_platforms(&["google".into(), "GoogleAds".into(), "tiktok".into()]).unwrap();
        assert_eq!(parsed, vec![Platform::GoogleAds, Platform::TikTok]);
        assert!(parse_platforms(&["friendster".into()]).is_err());
    }
}
