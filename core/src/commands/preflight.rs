//! preflight: prove the environment can run a seed/verify pipeline.
//!
//! Preflight never writes tenant data. A failing report blocks the
//! pipeline before any write is attempted.

use super::require_id;
use crate::{
    command::CommandHandler,
    config::ToolkitConfig,
    context::ExecutionContext,
    error::{SimError, SimResult},
    fixture::FixtureProvider,
    scenario::ScenarioCatalog,
    store::TenantDataClient,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default)]
pub struct PreflightCommand {
    pub tenant_id:      Option<String>,
    pub scenario_id:    Option<String>,
    /// Fail when the tenant does not exist yet (skip when bootstrapping).
    pub require_tenant: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreflightCheck {
    pub name:   String,
    pub ok:     bool,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreflightReport {
    pub ok:     bool,
    pub checks: Vec<PreflightCheck>,
}

impl PreflightReport {
    pub fn failures(&self) -> impl Iterator<Item = &PreflightCheck> {
        self.checks.iter().filter(|c| !c.ok)
    }

    pub fn summary(&self) -> String {
        let failed: Vec<&str> = self.failures().map(|c| c.name.as_str()).collect();
        if failed.is_empty() {
            format!("{} checks ok", self.checks.len())
        } else {
            format!("failed: {}", failed.join(", "))
        }
    }
}

pub struct PreflightHandler<'a> {
    client:    &'a dyn TenantDataClient,
    scenarios: &'a ScenarioCatalog,
    fixtures:  &'a FixtureProvider,
    config:    &'a ToolkitConfig,
}

impl<'a> PreflightHandler<'a> {
    pub fn new(
        client: &'a dyn TenantDataClient,
        scenarios: &'a ScenarioCatalog,
        fixtures: &'a FixtureProvider,
        config: &'a ToolkitConfig,
    ) -> Self {
        Self { client, scenarios, fixtures, config }
    }

    fn reports_dir_writable(&self) -> Result<(), String> {
        let dir = &self.config.reports_dir;
        std::fs::create_dir_all(dir).map_err(|e| e.to_string())?;
        let probe = dir.join(".preflight-probe");
        std::fs::write(&probe, b"ok").map_err(|e| e.to_string())?;
        std::fs::remove_file(&probe).map_err(|e| e.to_string())
    }
}

fn check(name: &str, outcome: Result<String, String>) -> PreflightCheck {
    match outcome {
        Ok(detail) => PreflightCheck { name: name.into(), ok: true, detail },
        Err(detail) => PreflightCheck { name: name.into(), ok: false, detail },
    }
}

impl CommandHandler for PreflightHandler<'_> {
    type Command = PreflightCommand;
    type Valid = PreflightCommand;
    type Output = PreflightReport;

    fn name(&self) -> &'static str { "preflight" }

    fn validate(&self, cmd: &PreflightCommand) -> SimResult<PreflightCommand> {
        let tenant_id = cmd.tenant_id.as_deref().map(|t| require_id("tenant_id", t)).transpose()?;
        let scenario_id = cmd.scenario_id.as_deref().map(|s| require_id("scenario_id", s)).transpose()?;
        if cmd.require_tenant && tenant_id.is_none() {
            return Err(SimError::validation("tenant_id", "is required when require_tenant is set"));
        }
        Ok(PreflightCommand { tenant_id, scenario_id, require_tenant: cmd.require_tenant })
    }

    fn execute(&self, cmd: &PreflightCommand, ctx: &ExecutionContext) -> SimResult<PreflightReport> {
        let mut checks = vec![
            check("database", self.client.ping().map(|_| "reachable, schema present".into()).map_err(|e| e.to_string())),
            check("reports_dir", self.reports_dir_writable().map(|_| "writable".into())),
            check(
                "scenario_catalog",
                if self.scenarios.is_empty() {
                    Err("no scenarios configured".into())
                } else {
                    Ok(format!("{} scenarios", self.scenarios.len()))
                },
            ),
        ];

        if let Some(scenario_id) = &cmd.scenario_id {
            checks.push(check(
                "scenario",
                self.scenarios.get(scenario_id).map(|s| s.name.clone()).map_err(|e| e.to_string()),
            ));
            checks.push(check(
                "fixture",
                self.fixtures
                    .load_fixture(scenario_id)
                    .map(|f| format!("{} rows expected", f.shape.total_metric_rows))
                    .map_err(|e| e.to_string()),
            ));
        }

        if let (Some(tenant), true) = (&cmd.tenant_id, cmd.require_tenant) {
            let outcome = match self.client.tenant_exists(tenant) {
                Ok(true) => Ok("exists".to_string()),
                Ok(false) => Err(format!("tenant '{tenant}' not found")),
                Err(e) => Err(e.to_string()),
            };
            checks.push(check("tenant", outcome));
        }

        let report = PreflightReport { ok: checks.iter().all(|c| c.ok), checks };
        if report.ok {
            ctx.logger().info(&format!("preflight: {}", report.summary()));
        } else {
            ctx.logger().warn(&format!("preflight: {}", report.summary()));
        }
        ctx.print(&format!("preflight: {}", report.summary()));
        Ok(report)
    }
}
