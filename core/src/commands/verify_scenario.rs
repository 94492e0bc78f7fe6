//! verify-scenario: re-read a tenant's scenario data and check it.

use super::require_id;
use crate::{
    command::CommandHandler,
    context::ExecutionContext,
    error::SimResult,
    fixture::FixtureProvider,
    rng::Seed,
    scenario::ScenarioCatalog,
    store::TenantDataClient,
    verification::{VerificationReport, VerificationService},
};

#[derive(Debug, Clone, Default)]
pub struct VerifyScenarioCommand {
    pub tenant_id:   String,
    pub scenario_id: String,
    /// Overrides the seed recorded by the tenant's last seed run.
    pub seed:        Option<Seed>,
}

pub struct VerifyScenarioHandler<'a> {
    service:   VerificationService<'a>,
    scenarios: &'a ScenarioCatalog,
}

impl<'a> VerifyScenarioHandler<'a> {
    pub fn new(
        client: &'a dyn TenantDataClient,
        scenarios: &'a ScenarioCatalog,
        fixtures: &'a FixtureProvider,
        source_prefix: &'a str,
    ) -> Self {
        Self {
            service: VerificationService::new(client, scenarios, fixtures, source_prefix),
            scenarios,
        }
    }
}

impl CommandHandler for VerifyScenarioHandler<'_> {
    type Command = VerifyScenarioCommand;
    type Valid = VerifyScenarioCommand;
    type Output = VerificationReport;

    fn name(&self) -> &'static str { "verify-scenario" }

    fn validate(&self, cmd: &VerifyScenarioCommand) -> SimResult<VerifyScenarioCommand> {
        let valid = VerifyScenarioCommand {
            tenant_id:   require_id("tenant_id", &cmd.tenant_id)?,
            scenario_id: require_id("scenario_id", &cmd.scenario_id)?,
            seed:        cmd.seed.clone(),
        };
        self.scenarios.get(&valid.scenario_id)?;
        Ok(valid)
    }

    fn execute(&self, cmd: &VerifyScenarioCommand, ctx: &ExecutionContext) -> SimResult<VerificationReport> {
        let report = self
            .service
            .verify_scenario(&cmd.scenario_id, &cmd.tenant_id, cmd.seed.as_ref(), ctx)?;
        ctx.print(&format!("verify {}: {:?} ({})", cmd.scenario_id, report.summary.status, report.summary.text()));
        for r in report.results.iter().filter(|r| r.status != crate::verification::CheckStatus::Pass) {
            ctx.print(&format!("  {:?} {}: {}", r.status, r.name, r.message));
        }
        Ok(report)
    }
}
