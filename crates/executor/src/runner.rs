//! Command runner
//!
//! Runs a command list in order and stops at the first signal that is not
//! `Continue`. A thrown signal is remembered so that `try` can inspect it
//! after the run; `reset` forgets it.

use crate::command::CommandList;
use crate::flow::ControlFlow;
use crate::request::RequestContext;
use tracing::{debug, trace};
use workdoc_core::Result;

/// Sequential executor of command lists
#[derive(Debug, Default)]
pub struct CommandRunner {
    thrown_code: Option<String>,
    thrown_message: Option<String>,
}

impl CommandRunner {
    /// Fresh runner
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `commands` until one of them does not continue
    ///
    /// Returns the stopping signal, or `Continue` if every command ran.
    pub fn run_commands(
        &mut self,
        ctx: &mut RequestContext,
        commands: &CommandList,
    ) -> Result<ControlFlow> {
        for command in commands.iter() {
            trace!(target: "workdoc::executor", command = command.name(), "run");
            let flow = command.run(ctx)?;
            if flow.can_continue() {
                continue;
            }
            if let ControlFlow::Thrown { code, message } = &flow {
                debug!(target: "workdoc::executor", command = command.name(), code = %code, "code thrown");
                self.thrown_code = Some(code.clone());
                self.thrown_message = message.clone();
            }
            return Ok(flow);
        }
        Ok(ControlFlow::Continue)
    }

    /// Code thrown by the last run, if any
    pub fn thrown_code(&self) -> Option<&str> {
        self.thrown_code.as_deref()
    }

    /// Message thrown by the last run, if any
    pub fn thrown_message(&self) -> Option<&str> {
        self.thrown_message.as_deref()
    }

    /// Forget any thrown code and message
    pub fn reset(&mut self) {
        self.thrown_code = None;
        self.thrown_message = None;
    }
}
