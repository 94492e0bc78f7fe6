//! bootstrap-tenant: make sure the tenant row exists before seeding.

use super::{require_confirmation, require_id};
use crate::{
    command::{effective_dry_run, CommandHandler},
    context::ExecutionContext,
    error::{SimError, SimResult},
    store::TenantDataClient,
    types::TenantId,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default)]
pub struct BootstrapTenantCommand {
    pub tenant_id:     String,
    pub name:          Option<String>,
    pub dry_run:       bool,
    pub confirm_write: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapOutcome {
    pub tenant_id:       TenantId,
    pub dry_run:         bool,
    pub already_existed: bool,
    pub created:         bool,
}

pub struct BootstrapTenantHandler<'a> {
    client: &'a dyn TenantDataClient,
}

impl<'a> BootstrapTenantHandler<'a> {
    pub fn new(client: &'a dyn TenantDataClient) -> Self {
        Self { client }
    }
}

impl CommandHandler for BootstrapTenantHandler<'_> {
    type Command = BootstrapTenantCommand;
    type Valid = BootstrapTenantCommand;
    type Output = BootstrapOutcome;

    fn name(&self) -> &'static str { "bootstrap-tenant" }

    fn validate(&self, cmd: &BootstrapTenantCommand) -> SimResult<BootstrapTenantCommand> {
        let tenant_id = require_id("tenant_id", &cmd.tenant_id)?;
        require_confirmation(self.name(), cmd.dry_run, cmd.confirm_write)?;
        let name = cmd
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);
        Ok(BootstrapTenantCommand { tenant_id, name, ..cmd.clone() })
    }

    fn execute(&self, cmd: &BootstrapTenantCommand, ctx: &ExecutionContext) -> SimResult<BootstrapOutcome> {
        let tenant = cmd.tenant_id.as_str();
        let dry_run = effective_dry_run(cmd.dry_run, ctx);
        let already_existed = self
            .client
            .tenant_exists(tenant)
            .map_err(|e| SimError::dependency("bootstrap.tenant_exists", tenant, e))?;

        let created = if already_existed || dry_run {
            false
        } else {
            let name = cmd.name.clone().unwrap_or_else(|| format!("Mock tenant {tenant}"));
            self.client
                .create_tenant(tenant, &name)
                .map_err(|e| SimError::dependency("bootstrap.create_tenant", tenant, e))?
        };

        let line = match (already_existed, dry_run) {
            (true, _)      => format!("tenant {tenant} already exists"),
            (false, true)  => format!("dry run: would create tenant {tenant}"),
            (false, false) => format!("created tenant {tenant}"),
        };
        ctx.logger().info(&line);
        ctx.print(&line);

        Ok(BootstrapOutcome { tenant_id: tenant.to_string(), dry_run, already_existed, created })
    }
}
