//! seed-scenario: materialize a scenario's projection into a tenant.
//!
//! Writes go day by day in ascending date order, in transactional
//! batches, with insert-or-ignore on the row's external id. Re-running
//! the same scenario and seed is therefore a no-op.

use super::{parse_platforms, require_confirmation, require_id, validate_days};
use crate::{
    command::{effective_dry_run, CommandHandler},
    config::ToolkitConfig,
    context::ExecutionContext,
    dataset::{project_scenario, ProjectionRequest},
    error::{SimError, SimResult},
    rng::Seed,
    scenario::ScenarioCatalog,
    store::{DeleteCounts, SeedRunRecord, TenantDataClient},
    types::{Platform, ScenarioId, TenantId},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedMode {
    /// Keep existing rows; duplicates are skipped. Refused when the
    /// scenario was last seeded with a different seed, days or platforms.
    #[default]
    Append,
    /// Delete this scenario's mock data for the tenant first.
    Replace,
}

#[derive(Debug, Clone, Default)]
pub struct SeedScenarioCommand {
    pub tenant_id:     String,
    pub scenario_id:   String,
    pub mode:          SeedMode,
    pub seed:          Option<Seed>,
    pub days:          Option<i64>,
    pub platforms:     Vec<String>,
    pub dry_run:       bool,
    pub confirm_write: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidSeedScenario {
    pub tenant_id:   TenantId,
    pub scenario_id: ScenarioId,
    pub mode:        SeedMode,
    pub seed:        Seed,
    pub days:        u32,
    pub platforms:   Vec<Platform>,
    pub dry_run:     bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedOutcome {
    pub tenant_id:         TenantId,
    pub scenario_id:       ScenarioId,
    pub dry_run:           bool,
    pub seed:              Seed,
    pub days:              u32,
    pub platforms:         Vec<Platform>,
    pub start_date:        NaiveDate,
    pub end_date:          NaiveDate,
    pub projected_rows:    u64,
    pub rows_created:      u64,
    pub rows_skipped:      u64,
    pub campaigns_created: u64,
    pub batches_committed: u32,
    pub checksum:          String,
    pub deleted:           Option<DeleteCounts>,
}

impl SeedOutcome {
    pub fn summary(&self) -> String {
        if self.dry_run {
            format!(
                "dry run: would write {} rows for {} day(s) x {} platform(s)",
                self.projected_rows,
                self.days,
                self.platforms.len()
            )
        } else {
            format!(
                "{} rows created, {} skipped, {} batches",
                self.rows_created, self.rows_skipped, self.batches_committed
            )
        }
    }
}

pub struct SeedScenarioHandler<'a> {
    client:    &'a dyn TenantDataClient,
    scenarios: &'a ScenarioCatalog,
    config:    &'a ToolkitConfig,
}

impl<'a> SeedScenarioHandler<'a> {
    pub fn new(client: &'a dyn TenantDataClient, scenarios: &'a ScenarioCatalog, config: &'a ToolkitConfig) -> Self {
        Self { client, scenarios, config }
    }
}

impl CommandHandler for SeedScenarioHandler<'_> {
    type Command = SeedScenarioCommand;
    type Valid = ValidSeedScenario;
    type Output = SeedOutcome;

    fn name(&self) -> &'static str { "seed-scenario" }

    fn validate(&self, cmd: &SeedScenarioCommand) -> SimResult<ValidSeedScenario> {
        let tenant_id = require_id("tenant_id", &cmd.tenant_id)?;
        let scenario_id = require_id("scenario_id", &cmd.scenario_id)?;
        let platforms = parse_platforms(&cmd.platforms)?;
        let days = cmd.days.map(validate_days).transpose()?;
        require_confirmation(self.name(), cmd.dry_run, cmd.confirm_write)?;

        let scenario = self.scenarios.get(&scenario_id)?;
        Ok(ValidSeedScenario {
            tenant_id,
            mode: cmd.mode,
            seed: cmd.seed.clone().unwrap_or_else(|| scenario.seed.clone()),
            days: days.unwrap_or(scenario.days),
            platforms: if platforms.is_empty() { scenario.platforms.clone() } else { platforms },
            dry_run: cmd.dry_run,
            scenario_id,
        })
    }

    fn execute(&self, cmd: &ValidSeedScenario, ctx: &ExecutionContext) -> SimResult<SeedOutcome> {
        let scenario = self.scenarios.get(&cmd.scenario_id)?;
        let dataset = project_scenario(&ProjectionRequest {
            tenant_id:     &cmd.tenant_id,
            scenario,
            seed:          &cmd.seed,
            days:          cmd.days,
            platforms:     &cmd.platforms,
            source_prefix: &self.config.source_prefix,
        });
        let dry_run = effective_dry_run(cmd.dry_run, ctx);
        let mut outcome = SeedOutcome {
            tenant_id:         cmd.tenant_id.clone(),
            scenario_id:       cmd.scenario_id.clone(),
            dry_run,
            seed:              cmd.seed.clone(),
            days:              cmd.days,
            platforms:         cmd.platforms.clone(),
            start_date:        scenario.start_date,
            end_date:          scenario.end_date(cmd.days),
            projected_rows:    dataset.metrics.len() as u64,
            rows_created:      0,
            rows_skipped:      0,
            campaigns_created: 0,
            batches_committed: 0,
            checksum:          dataset.checksum(),
            deleted:           None,
        };

        if dry_run {
            ctx.logger().info(&format!("seed {}: {}", cmd.scenario_id, outcome.summary()));
            ctx.print(&outcome.summary());
            return Ok(outcome);
        }

        let tenant = cmd.tenant_id.as_str();
        let exists = self
            .client
            .tenant_exists(tenant)
            .map_err(|e| SimError::dependency("seed.tenant_exists", tenant, e))?;
        if !exists {
            return Err(SimError::not_found("tenant", tenant));
        }

        if cmd.mode == SeedMode::Append {
            let prior = self
                .client
                .last_seed_run(tenant, &cmd.scenario_id)
                .map_err(|e| SimError::dependency("seed.last_seed_run", tenant, e))?;
            if let Some(prior) = prior.filter(|p| !same_parameters(p, cmd)) {
                return Err(SimError::validation(
                    "mode",
                    format!(
                        "{} was seeded with seed {}, {} days, {:?}; use --mode replace to reseed with different parameters",
                        cmd.scenario_id, prior.seed, prior.days, prior.platforms
                    ),
                ));
            }
        }

        if cmd.mode == SeedMode::Replace {
            let deleted = self
                .client
                .delete_mock_data(tenant, &self.config.source_prefix, Some(&cmd.scenario_id))
                .map_err(|e| SimError::dependency("seed.delete_mock_data", tenant, e))?;
            ctx.logger().info(&format!("seed {}: replaced {} mock rows", cmd.scenario_id, deleted.metrics));
            outcome.deleted = Some(deleted);
        }

        outcome.campaigns_created = self
            .client
            .insert_campaigns(&dataset.campaigns)
            .map_err(|e| SimError::dependency("seed.insert_campaigns", tenant, e))?;

        let batch_size = self.config.batch_size.clamp(1, crate::config::MAX_BATCH_SIZE);
        for batch in dataset.metrics.chunks(batch_size) {
            match self.client.insert_metric_batch(batch) {
                Ok(inserted) => {
                    outcome.rows_created += inserted;
                    outcome.rows_skipped += batch.len() as u64 - inserted;
                    outcome.batches_committed += 1;
                }
                Err(e) => {
                    // Earlier batches are committed; say so in the error.
                    return Err(SimError::dependency(
                        "seed.insert_metric_batch",
                        tenant,
                        format!(
                            "{e} ({} rows in {} batches committed before failure)",
                            outcome.rows_created, outcome.batches_committed
                        ),
                    ));
                }
            }
        }

        self.client
            .record_seed_run(&SeedRunRecord {
                run_id:       ctx.run_id.clone(),
                tenant_id:    tenant.to_string(),
                scenario_id:  cmd.scenario_id.clone(),
                seed:         cmd.seed.clone(),
                days:         cmd.days,
                platforms:    cmd.platforms.clone(),
                rows_created: outcome.rows_created,
                created_at:   chrono::Utc::now().to_rfc3339(),
            })
            .map_err(|e| SimError::dependency("seed.record_seed_run", tenant, e))?;

        ctx.logger().info(&format!("seed {}: {}", cmd.scenario_id, outcome.summary()));
        ctx.print(&outcome.summary());
        Ok(outcome)
    }
}

/// Seeds compare by folded value; platform order is ignored.
fn same_parameters(prior: &SeedRunRecord, cmd: &ValidSeedScenario) -> bool {
    prior.seed.to_u64() == cmd.seed.to_u64()
        && prior.days == cmd.days
        && prior.platforms.len() == cmd.platforms.len()
        && cmd.platforms.iter().all(|p| prior.platforms.contains(p))
}
