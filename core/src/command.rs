//! The command/handler contract.
//!
//! RULE: Every operation is a typed command plus a handler.
//!   - validate() is pure: no I/O, no clock, no randomness.
//!   - execute() only ever sees a validated command.
//!   - Both return SimResult; nothing panics across this boundary.

use crate::{context::ExecutionContext, error::SimResult};

pub trait CommandHandler {
    /// Raw, caller-constructed payload.
    type Command;
    /// The payload after validation, with defaults resolved.
    type Valid;
    type Output;

    /// Stable alias used by the CLI and in manifests.
    fn name(&self) -> &'static str;

    fn validate(&self, command: &Self::Command) -> SimResult<Self::Valid>;

    fn execute(&self, command: &Self::Valid, ctx: &ExecutionContext) -> SimResult<Self::Output>;

    /// Validate, then execute. Validation failures never reach I/O.
    fn run(&self, command: &Self::Command, ctx: &ExecutionContext) -> SimResult<Self::Output> {
        let valid = self.validate(command)?;
        ctx.logger().debug(&format!("{}: validated", self.name()));
        self.execute(&valid, ctx)
    }
}

/// A write is only applied when neither the command nor the context
/// asks for a dry run.
pub fn effective_dry_run(command_dry_run: bool, ctx: &ExecutionContext) -> bool {
    command_dry_run || ctx.dry_run
}
