//! Built-in commands
//!
//! | Element | Command |
//! |---------|---------|
//! | `do` | [`DoCommand`] |
//! | `throw` | [`ThrowCommand`] |
//! | `context-set` | [`ContextSetCommand`] |
//! | `context-clear` | [`ContextClearCommand`] |
//! | `context-localise` | [`ContextLocaliseCommand`] |
//! | `for-each` | [`ForEachCommand`] |
//! | `assign` | [`AssignCommand`] |
//! | `remove` | [`RemoveCommand`] |
//! | `call-module` | [`CallModuleCommand`] |
//! | `break` | [`BreakCommand`] |
//!
//! `try` lives in [`crate::try_command`].

use crate::command::{Command, CommandList};
use crate::flow::{CallStackTransformation, ControlFlow};
use crate::request::RequestContext;
use crate::runner::CommandRunner;
use tracing::debug;
use workdoc_context::PathContext;
use workdoc_core::{Error, Result};

// ==================== Sequencing ====================

/// Runs a nested command list
#[derive(Debug)]
pub struct DoCommand {
    commands: CommandList,
}

impl DoCommand {
    /// Wrap a list
    pub fn new(commands: CommandList) -> Self {
        DoCommand { commands }
    }
}

impl Command for DoCommand {
    fn name(&self) -> &str {
        "do"
    }

    fn run(&self, ctx: &mut RequestContext) -> Result<ControlFlow> {
        CommandRunner::new().run_commands(ctx, &self.commands)
    }

    fn validate(&self) -> Result<()> {
        self.commands.validate()
    }
}

/// Leaves the innermost `for-each`
#[derive(Debug, Clone, Copy)]
pub struct BreakCommand;

impl Command for BreakCommand {
    fn name(&self) -> &str {
        "break"
    }

    fn run(&self, _ctx: &mut RequestContext) -> Result<ControlFlow> {
        Ok(ControlFlow::Break)
    }
}

/// Raises a script-level exception
#[derive(Debug, Clone)]
pub struct ThrowCommand {
    code: String,
    message: Option<String>,
}

impl ThrowCommand {
    /// Throw `code` with an optional message
    pub fn new(code: impl Into<String>, message: Option<String>) -> Self {
        ThrowCommand {
            code: code.into(),
            message,
        }
    }
}

impl Command for ThrowCommand {
    fn name(&self) -> &str {
        "throw"
    }

    fn run(&self, ctx: &mut RequestContext) -> Result<ControlFlow> {
        let message = match &self.message {
            Some(m) => Some(ctx.evaluate_string(m)?),
            None => None,
        };
        Ok(ControlFlow::thrown(self.code.clone(), message))
    }
}

/// Transfers control to another module
#[derive(Debug, Clone)]
pub struct CallModuleCommand {
    module: String,
}

impl CallModuleCommand {
    /// Call `module`
    pub fn new(module: impl Into<String>) -> Self {
        CallModuleCommand {
            module: module.into(),
        }
    }
}

impl Command for CallModuleCommand {
    fn name(&self) -> &str {
        "call-module"
    }

    fn run(&self, _ctx: &mut RequestContext) -> Result<ControlFlow> {
        Ok(ControlFlow::CallStackTransformation(
            CallStackTransformation::call(self.module.clone()),
        ))
    }
}

// ==================== Context ====================

/// Binds a contextual label to the single node a query matches
#[derive(Debug, Clone)]
pub struct ContextSetCommand {
    name: String,
    query: String,
}

impl ContextSetCommand {
    /// Bind `name` to the node matched by `query`
    pub fn new(name: impl Into<String>, query: impl Into<String>) -> Self {
        ContextSetCommand {
            name: name.into(),
            query: query.into(),
        }
    }
}

impl Command for ContextSetCommand {
    fn name(&self) -> &str {
        "context-set"
    }

    fn run(&self, ctx: &mut RequestContext) -> Result<ControlFlow> {
        let name = ctx.evaluate_string(&self.name)?;
        let node = ctx
            .table_mut()
            .resolve_one(&self.query, PathContext::Default, false)?;
        ctx.table_mut().set_label(&name, node)?;
        Ok(ControlFlow::Continue)
    }
}

/// Removes a contextual label
#[derive(Debug, Clone)]
pub struct ContextClearCommand {
    name: String,
}

impl ContextClearCommand {
    /// Remove `name` (a literal or `string(query)`)
    pub fn new(name: impl Into<String>) -> Self {
        ContextClearCommand { name: name.into() }
    }
}

impl Command for ContextClearCommand {
    fn name(&self) -> &str {
        "context-clear"
    }

    fn run(&self, ctx: &mut RequestContext) -> Result<ControlFlow> {
        let name = ctx.evaluate_string(&self.name)?;
        if name.is_empty() {
            return Err(Error::command_syntax(
                "context-clear",
                format!("name '{}' evaluated to an empty label", self.name),
            ));
        }
        ctx.table_mut().unbind(&name)?;
        Ok(ControlFlow::Continue)
    }
}

/// Runs nested commands inside a localisation scope
#[derive(Debug)]
pub struct ContextLocaliseCommand {
    purpose: String,
    commands: CommandList,
}

impl ContextLocaliseCommand {
    /// Localise for `purpose` while `commands` run
    pub fn new(purpose: impl Into<String>, commands: CommandList) -> Self {
        ContextLocaliseCommand {
            purpose: purpose.into(),
            commands,
        }
    }
}

impl Command for ContextLocaliseCommand {
    fn name(&self) -> &str {
        "context-localise"
    }

    fn run(&self, ctx: &mut RequestContext) -> Result<ControlFlow> {
        ctx.table_mut().localise(self.purpose.clone());
        let outcome = CommandRunner::new().run_commands(ctx, &self.commands);
        let popped = ctx.table_mut().delocalise(&self.purpose);
        let flow = outcome?;
        popped?;
        Ok(flow)
    }

    fn validate(&self) -> Result<()> {
        self.commands.validate()
    }
}

/// Runs nested commands once per node matched by a query
///
/// Each node is bound to `item_label` inside a localisation scope, so the
/// label disappears when the loop ends. `break` ends the loop early.
#[derive(Debug)]
pub struct ForEachCommand {
    query: String,
    item_label: String,
    commands: CommandList,
}

impl ForEachCommand {
    /// Loop over `query`, binding each node to `item_label`
    pub fn new(query: impl Into<String>, item_label: impl Into<String>, commands: CommandList) -> Self {
        ForEachCommand {
            query: query.into(),
            item_label: item_label.into(),
            commands,
        }
    }

    fn iterate(&self, ctx: &mut RequestContext) -> Result<ControlFlow> {
        let nodes = ctx
            .table_mut()
            .resolve_all(&self.query, PathContext::Default, false)?;
        debug!(target: "workdoc::executor", query = %self.query, items = nodes.len(), "for-each");
        let mut runner = CommandRunner::new();
        for node in nodes {
            ctx.table_mut().set_label(&self.item_label, node)?;
            match runner.run_commands(ctx, &self.commands)? {
                ControlFlow::Continue => {}
                ControlFlow::Break => break,
                other => return Ok(other),
            }
        }
        Ok(ControlFlow::Continue)
    }
}

impl Command for ForEachCommand {
    fn name(&self) -> &str {
        "for-each"
    }

    fn run(&self, ctx: &mut RequestContext) -> Result<ControlFlow> {
        let shadowed = ctx.table().get(&self.item_label);
        ctx.table_mut().localise("for-each");
        let outcome = self.iterate(ctx);
        let popped = ctx.table_mut().delocalise("for-each");
        if let Some(previous) = shadowed {
            ctx.table_mut().bind(&self.item_label, previous, None);
        }
        let flow = outcome?;
        popped?;
        Ok(flow)
    }

    fn validate(&self) -> Result<()> {
        self.commands.validate()
    }
}

// ==================== Data ====================

/// Sets the text of a node, creating the node if needed
#[derive(Debug, Clone)]
pub struct AssignCommand {
    target: String,
    value: String,
}

impl AssignCommand {
    /// Set `target` to `value` (a literal or `string(query)`)
    pub fn new(target: impl Into<String>, value: impl Into<String>) -> Self {
        AssignCommand {
            target: target.into(),
            value: value.into(),
        }
    }
}

impl Command for AssignCommand {
    fn name(&self) -> &str {
        "assign"
    }

    fn run(&self, ctx: &mut RequestContext) -> Result<ControlFlow> {
        let value = ctx.evaluate_string(&self.value)?;
        let node = ctx
            .table_mut()
            .resolve_one(&self.target, PathContext::Default, true)?;
        let mut tree = node.tree().write();
        tree.set_text(node.node(), value)?;
        Ok(ControlFlow::Continue)
    }
}

/// Removes every node a query matches
#[derive(Debug, Clone)]
pub struct RemoveCommand {
    query: String,
}

impl RemoveCommand {
    /// Remove the nodes matched by `query`
    pub fn new(query: impl Into<String>) -> Self {
        RemoveCommand {
            query: query.into(),
        }
    }
}

impl Command for RemoveCommand {
    fn name(&self) -> &str {
        "remove"
    }

    fn run(&self, ctx: &mut RequestContext) -> Result<ControlFlow> {
        let nodes = ctx
            .table_mut()
            .resolve_all(&self.query, PathContext::Default, false)?;
        for node in nodes {
            let mut tree = node.tree().write();
            // An earlier match may have been an ancestor
            if tree.is_attached(node.node()) {
                tree.remove(node.node())?;
            }
        }
        Ok(ControlFlow::Continue)
    }
}
