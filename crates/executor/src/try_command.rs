//! try / catch / finally
//!
//! ```text
//! <try>
//!   <do> ... </do>
//!   <catch codes="BAD_INPUT NOT_FOUND"> ... </catch>
//!   <catch codes="OTHERS"> ... </catch>
//!   <finally> ... </finally>
//! </try>
//! ```
//!
//! The try list runs in a sub-runner. A thrown code is published to
//! `:{sys}/exceptions/current-code` and `current-message`, then the first
//! catch block naming the code (or `OTHERS`) runs. The finally list runs
//! afterwards unless the try/catch outcome is a call-stack transformation;
//! a finally outcome that does not continue replaces the try/catch outcome.

use crate::command::{Command, CommandList};
use crate::flow::ControlFlow;
use crate::request::RequestContext;
use crate::runner::CommandRunner;
use std::collections::HashSet;
use tracing::debug;
use workdoc_core::{Error, Result};

/// Catch-all code
pub const OTHERS: &str = "OTHERS";

/// sys path of the code being handled
pub const CURRENT_CODE_PATH: &str = "exceptions/current-code";
/// sys path of the message being handled
pub const CURRENT_MESSAGE_PATH: &str = "exceptions/current-message";

/// One `catch` clause
#[derive(Debug)]
pub struct CatchBlock {
    codes: HashSet<String>,
    commands: CommandList,
}

impl CatchBlock {
    /// Catch the whitespace-separated `codes` with `commands`
    ///
    /// # Errors
    /// `CommandSyntax` if `codes` names no code.
    pub fn new(codes: &str, commands: CommandList) -> Result<Self> {
        let codes: HashSet<String> = codes.split_whitespace().map(str::to_string).collect();
        if codes.is_empty() {
            return Err(Error::command_syntax(
                "catch",
                "a catch must name at least one code in its codes attribute",
            ));
        }
        Ok(CatchBlock { codes, commands })
    }

    /// Whether `code` is caught verbatim by this clause
    pub fn catches(&self, code: &str) -> bool {
        self.codes.contains(code)
    }
}

/// The `try` command
#[derive(Debug)]
pub struct TryCommand {
    try_commands: CommandList,
    catches: Vec<CatchBlock>,
    finally: Option<CommandList>,
}

impl TryCommand {
    /// Assemble a try command
    pub fn new(try_commands: CommandList, catches: Vec<CatchBlock>, finally: Option<CommandList>) -> Self {
        TryCommand {
            try_commands,
            catches,
            finally,
        }
    }

    fn matching_catch(&self, code: &str) -> Option<&CatchBlock> {
        self.catches
            .iter()
            .find(|c| c.catches(code) || c.catches(OTHERS))
    }
}

impl Command for TryCommand {
    fn name(&self) -> &str {
        "try"
    }

    fn run(&self, ctx: &mut RequestContext) -> Result<ControlFlow> {
        let mut runner = CommandRunner::new();
        let mut outcome = runner.run_commands(ctx, &self.try_commands)?;

        if let Some(code) = runner.thrown_code().map(str::to_string) {
            let message = runner.thrown_message().unwrap_or_default().to_string();
            ctx.add_sys_info(CURRENT_CODE_PATH, &code)?;
            ctx.add_sys_info(CURRENT_MESSAGE_PATH, &message)?;
            runner.reset();

            if let Some(block) = self.matching_catch(&code) {
                debug!(target: "workdoc::executor", code = %code, "caught");
                outcome = runner.run_commands(ctx, &block.commands)?;
            }
        }

        let finally_outcome = match &self.finally {
            Some(finally) if !outcome.is_call_stack_transformation() => {
                runner.reset();
                runner.run_commands(ctx, finally)?
            }
            _ => ControlFlow::Continue,
        };

        if finally_outcome.can_continue() {
            Ok(outcome)
        } else {
            Ok(finally_outcome)
        }
    }

    fn validate(&self) -> Result<()> {
        self.try_commands.validate()?;
        for block in &self.catches {
            block.commands.validate()?;
        }
        if let Some(finally) = &self.finally {
            finally.validate()?;
        }
        Ok(())
    }
}
