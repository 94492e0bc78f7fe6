//! reset-tenant / reset-tenant-hard.
//!
//! The soft reset removes only mock-tagged rows from this toolkit's
//! source prefix. The hard reset removes everything the tenant owns and
//! additionally requires `acknowledge` to repeat the tenant id.

use super::{require_confirmation, require_id};
use crate::{
    command::{effective_dry_run, CommandHandler},
    context::ExecutionContext,
    error::{SimError, SimResult},
    store::{DeleteCounts, MetricFilter, TenantDataClient},
    types::TenantId,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default)]
pub struct ResetTenantCommand {
    pub tenant_id:     String,
    pub dry_run:       bool,
    pub confirm_write: bool,
    /// Hard reset only: must equal `tenant_id`.
    pub acknowledge:   Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetOutcome {
    pub tenant_id: TenantId,
    pub hard:      bool,
    pub dry_run:   bool,
    /// Rows removed, or rows that would be removed on a dry run.
    pub deleted:   DeleteCounts,
}

pub struct ResetTenantHandler<'a> {
    client:        &'a dyn TenantDataClient,
    source_prefix: &'a str,
    hard:          bool,
}

impl<'a> ResetTenantHandler<'a> {
    pub fn soft(client: &'a dyn TenantDataClient, source_prefix: &'a str) -> Self {
        Self { client, source_prefix, hard: false }
    }

    pub fn hard(client: &'a dyn TenantDataClient, source_prefix: &'a str) -> Self {
        Self { client, source_prefix, hard: true }
    }

    /// Counts with the same predicates the live delete uses.
    fn projected(&self, tenant: &str) -> SimResult<DeleteCounts> {
        let (filter, mock_source) = if self.hard {
            (MetricFilter::default(), None)
        } else {
            let filter = MetricFilter {
                mock_only: Some(true),
                source: Some(self.source_prefix.to_string()),
                ..Default::default()
            };
            (filter, Some(self.source_prefix))
        };
        let metrics = self
            .client
            .count_metrics(tenant, &filter)
            .map_err(|e| SimError::dependency("reset.count_metrics", tenant, e))?;
        let campaigns = self
            .client
            .count_campaigns(tenant, mock_source)
            .map_err(|e| SimError::dependency("reset.count_campaigns", tenant, e))?;
        let seed_runs = self
            .client
            .count_seed_runs(tenant, None)
            .map_err(|e| SimError::dependency("reset.count_seed_runs", tenant, e))?;
        Ok(DeleteCounts { metrics, campaigns, seed_runs })
    }
}

impl CommandHandler for ResetTenantHandler<'_> {
    type Command = ResetTenantCommand;
    type Valid = ResetTenantCommand;
    type Output = ResetOutcome;

    fn name(&self) -> &'static str {
        if self.hard { "reset-tenant-hard" } else { "reset-tenant" }
    }

    fn validate(&self, cmd: &ResetTenantCommand) -> SimResult<ResetTenantCommand> {
        let tenant_id = require_id("tenant_id", &cmd.tenant_id)?;
        require_confirmation(self.name(), cmd.dry_run, cmd.confirm_write)?;
        if self.hard && !cmd.dry_run && cmd.acknowledge.as_deref() != Some(tenant_id.as_str()) {
            return Err(SimError::destructive_guard(
                self.name(),
                "acknowledge must repeat the tenant id",
            ));
        }
        Ok(ResetTenantCommand { tenant_id, ..cmd.clone() })
    }

    fn execute(&self, cmd: &ResetTenantCommand, ctx: &ExecutionContext) -> SimResult<ResetOutcome> {
        let tenant = cmd.tenant_id.as_str();
        let dry_run = effective_dry_run(cmd.dry_run, ctx);

        let deleted = if dry_run {
            self.projected(tenant)?
        } else if self.hard {
            self.client
                .delete_tenant_data(tenant)
                .map_err(|e| SimError::dependency("reset.delete_tenant_data", tenant, e))?
        } else {
            self.client
                .delete_mock_data(tenant, self.source_prefix, None)
                .map_err(|e| SimError::dependency("reset.delete_mock_data", tenant, e))?
        };

        let verb = if dry_run { "would delete" } else { "deleted" };
        let line = format!(
            "{} {tenant}: {verb} {} metric rows, {} campaigns",
            self.name(),
            deleted.metrics,
            deleted.campaigns
        );
        if dry_run {
            ctx.logger().info(&line);
        } else {
            ctx.logger().warn(&line);
        }
        ctx.print(&line);

        Ok(ResetOutcome { tenant_id: tenant.to_string(), hard: self.hard, dry_run, deleted })
    }
}
