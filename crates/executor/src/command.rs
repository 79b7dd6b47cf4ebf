//! Command contract and command lists

use crate::flow::ControlFlow;
use crate::request::RequestContext;
use std::fmt;
use workdoc_core::Result;

/// An executable script command
pub trait Command: Send + Sync + fmt::Debug {
    /// Command element name
    fn name(&self) -> &str;

    /// Run the command
    ///
    /// Script-level exceptions are returned as [`ControlFlow::Thrown`];
    /// `Err` is reserved for fatal failures.
    fn run(&self, ctx: &mut RequestContext) -> Result<ControlFlow>;

    /// Check the command (and any nested commands) for consistency
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// An ordered sequence of commands
#[derive(Debug, Default)]
pub struct CommandList {
    commands: Vec<Box<dyn Command>>,
}

impl CommandList {
    /// Empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: append a command
    pub fn with(mut self, command: impl Command + 'static) -> Self {
        self.commands.push(Box::new(command));
        self
    }

    /// Append a boxed command
    pub fn push(&mut self, command: Box<dyn Command>) {
        self.commands.push(command);
    }

    /// Number of commands
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether the list is empty
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Commands in order
    pub fn iter(&self) -> impl Iterator<Item = &dyn Command> {
        self.commands.iter().map(|c| c.as_ref())
    }

    /// Validate every command
    pub fn validate(&self) -> Result<()> {
        self.commands.iter().try_for_each(|c| c.validate())
    }
}

impl From<Vec<Box<dyn Command>>> for CommandList {
    fn from(commands: Vec<Box<dyn Command>>) -> Self {
        CommandList { commands }
    }
}
