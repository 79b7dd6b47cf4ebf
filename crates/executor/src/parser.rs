//! Markup command factory
//!
//! Builds commands from markup held in a [`DocumentTree`]. Each element is
//! dispatched on its local name (any `prefix:` is ignored) to a registered
//! [`CommandFactory`]. The stock parser knows every built-in command:
//!
//! ```text
//! <do>
//!   <for-each xpath="ITEM" item="item">
//!     <assign target=":{item}/SEEN" value="yes"/>
//!   </for-each>
//!   <try>
//!     <do><throw code="BAD_INPUT" message="rejected"/></do>
//!     <catch codes="BAD_INPUT"><assign target="STATUS" value="caught"/></catch>
//!     <finally><assign target="DONE" value="true"/></finally>
//!   </try>
//! </do>
//! ```

use crate::builtins::{
    AssignCommand, BreakCommand, CallModuleCommand, ContextClearCommand, ContextLocaliseCommand,
    ContextSetCommand, DoCommand, ForEachCommand, RemoveCommand, ThrowCommand,
};
use crate::command::{Command, CommandList};
use crate::try_command::{CatchBlock, TryCommand};
use std::collections::HashMap;
use std::sync::Arc;
use workdoc_core::{DocumentTree, Error, NodeId, Result};

/// Builds one kind of command from its markup element
pub trait CommandFactory: Send + Sync {
    /// Element local names this factory handles
    fn element_names(&self) -> &[&'static str];

    /// Build the command for `element`
    fn create(
        &self,
        parser: &CommandParser,
        markup: &DocumentTree,
        element: NodeId,
    ) -> Result<Box<dyn Command>>;
}

type BuildFn = fn(&CommandParser, &DocumentTree, NodeId) -> Result<Box<dyn Command>>;

/// Factory backed by a plain function
pub struct FnFactory {
    names: Vec<&'static str>,
    build: BuildFn,
}

impl FnFactory {
    /// Factory handling `names` with `build`
    pub fn new(names: &[&'static str], build: BuildFn) -> Self {
        FnFactory {
            names: names.to_vec(),
            build,
        }
    }
}

impl CommandFactory for FnFactory {
    fn element_names(&self) -> &[&'static str] {
        &self.names
    }

    fn create(
        &self,
        parser: &CommandParser,
        markup: &DocumentTree,
        element: NodeId,
    ) -> Result<Box<dyn Command>> {
        (self.build)(parser, markup, element)
    }
}

/// Element-name dispatching command parser
#[derive(Default)]
pub struct CommandParser {
    factories: HashMap<String, Arc<dyn CommandFactory>>,
}

impl CommandParser {
    /// Parser without any factories
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parser with every built-in command registered
    pub fn with_builtins() -> Self {
        let mut parser = Self::empty();
        parser.register(Arc::new(FnFactory::new(&["do"], build_do)));
        parser.register(Arc::new(FnFactory::new(&["try"], build_try)));
        parser.register(Arc::new(FnFactory::new(&["throw"], build_throw)));
        parser.register(Arc::new(FnFactory::new(&["context-set"], build_context_set)));
        parser.register(Arc::new(FnFactory::new(&["context-clear"], build_context_clear)));
        parser.register(Arc::new(FnFactory::new(
            &["context-localise"],
            build_context_localise,
        )));
        parser.register(Arc::new(FnFactory::new(&["for-each"], build_for_each)));
        parser.register(Arc::new(FnFactory::new(&["assign"], build_assign)));
        parser.register(Arc::new(FnFactory::new(&["remove"], build_remove)));
        parser.register(Arc::new(FnFactory::new(&["call-module"], build_call_module)));
        parser.register(Arc::new(FnFactory::new(&["break"], build_break)));
        parser
    }

    /// Register a factory for every name it handles, replacing earlier ones
    pub fn register(&mut self, factory: Arc<dyn CommandFactory>) {
        for name in factory.element_names() {
            self.factories.insert(name.to_string(), Arc::clone(&factory));
        }
    }

    /// Whether a factory handles `name`
    pub fn handles(&self, name: &str) -> bool {
        self.factories.contains_key(local_name(name))
    }

    /// Build the command for one element
    pub fn parse_element(&self, markup: &DocumentTree, element: NodeId) -> Result<Box<dyn Command>> {
        let name = local_name(markup.name(element)?);
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| Error::command_syntax(name, "unknown command"))?;
        let command = factory.create(self, markup, element)?;
        command.validate()?;
        Ok(command)
    }

    /// Build a list from the child elements of `parent`
    pub fn parse_children(&self, markup: &DocumentTree, parent: NodeId) -> Result<CommandList> {
        let mut list = CommandList::new();
        for child in markup.children(parent)? {
            list.push(self.parse_element(markup, *child)?);
        }
        Ok(list)
    }

    /// Children of a lone nested `do`, or else the element's own children
    pub fn parse_nested_do_or_children(
        &self,
        markup: &DocumentTree,
        parent: NodeId,
    ) -> Result<CommandList> {
        match markup.children(parent)? {
            [only] if local_name(markup.name(*only)?) == "do" => {
                self.parse_children(markup, *only)
            }
            _ => self.parse_children(markup, parent),
        }
    }

    /// Parse a whole script: the root is a `do` (or any container element)
    pub fn parse_document(&self, markup: &DocumentTree) -> Result<CommandList> {
        self.parse_children(markup, markup.root())
    }
}

/// Element name without any `prefix:`
pub fn local_name(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

fn attr(markup: &DocumentTree, element: NodeId, name: &str) -> Result<Option<String>> {
    Ok(markup.attr(element, name)?.map(str::to_string))
}

fn required_attr(markup: &DocumentTree, element: NodeId, name: &str) -> Result<String> {
    match markup.attr(element, name)? {
        Some(v) if !v.trim().is_empty() => Ok(v.to_string()),
        _ => Err(Error::command_syntax(
            local_name(markup.name(element)?),
            format!("missing or empty '{}' attribute", name),
        )),
    }
}

fn build_do(parser: &CommandParser, markup: &DocumentTree, element: NodeId) -> Result<Box<dyn Command>> {
    Ok(Box::new(DoCommand::new(parser.parse_children(markup, element)?)))
}

fn build_try(parser: &CommandParser, markup: &DocumentTree, element: NodeId) -> Result<Box<dyn Command>> {
    let children = markup.children(element)?;
    let Some((first, rest)) = children.split_first() else {
        return Err(Error::command_syntax("try", "expected a 'do' as the first element"));
    };
    if local_name(markup.name(*first)?) != "do" {
        return Err(Error::command_syntax("try", "expected a 'do' as the first element"));
    }
    let try_commands = parser.parse_children(markup, *first)?;

    let mut catches = Vec::new();
    let mut finally = None;
    for (idx, child) in rest.iter().enumerate() {
        match local_name(markup.name(*child)?) {
            "catch" => {
                let codes = attr(markup, *child, "codes")?.ok_or_else(|| {
                    Error::command_syntax("catch", "a catch must have a 'codes' attribute")
                })?;
                let commands = parser.parse_nested_do_or_children(markup, *child)?;
                catches.push(CatchBlock::new(&codes, commands)?);
            }
            "finally" => {
                if finally.is_some() || idx + 1 != rest.len() {
                    return Err(Error::command_syntax(
                        "try",
                        "only one 'finally' may be given and it must be the last element",
                    ));
                }
                finally = Some(parser.parse_nested_do_or_children(markup, *child)?);
            }
            other => {
                return Err(Error::command_syntax(
                    "try",
                    format!("unexpected element '{}'", other),
                ))
            }
        }
    }
    Ok(Box::new(TryCommand::new(try_commands, catches, finally)))
}

fn build_throw(_: &CommandParser, markup: &DocumentTree, element: NodeId) -> Result<Box<dyn Command>> {
    Ok(Box::new(ThrowCommand::new(
        required_attr(markup, element, "code")?,
        attr(markup, element, "message")?,
    )))
}

fn build_context_set(
    _: &CommandParser,
    markup: &DocumentTree,
    element: NodeId,
) -> Result<Box<dyn Command>> {
    Ok(Box::new(ContextSetCommand::new(
        required_attr(markup, element, "name")?,
        required_attr(markup, element, "xpath")?,
    )))
}

fn build_context_clear(
    _: &CommandParser,
    markup: &DocumentTree,
    element: NodeId,
) -> Result<Box<dyn Command>> {
    Ok(Box::new(ContextClearCommand::new(required_attr(
        markup, element, "name",
    )?)))
}

fn build_context_localise(
    parser: &CommandParser,
    markup: &DocumentTree,
    element: NodeId,
) -> Result<Box<dyn Command>> {
    let purpose = attr(markup, element, "purpose")?.unwrap_or_else(|| "context-localise".into());
    Ok(Box::new(ContextLocaliseCommand::new(
        purpose,
        parser.parse_nested_do_or_children(markup, element)?,
    )))
}

fn build_for_each(
    parser: &CommandParser,
    markup: &DocumentTree,
    element: NodeId,
) -> Result<Box<dyn Command>> {
    Ok(Box::new(ForEachCommand::new(
        required_attr(markup, element, "xpath")?,
        required_attr(markup, element, "item")?,
        parser.parse_nested_do_or_children(markup, element)?,
    )))
}

fn build_assign(_: &CommandParser, markup: &DocumentTree, element: NodeId) -> Result<Box<dyn Command>> {
    Ok(Box::new(AssignCommand::new(
        required_attr(markup, element, "target")?,
        attr(markup, element, "value")?.unwrap_or_default(),
    )))
}

fn build_remove(_: &CommandParser, markup: &DocumentTree, element: NodeId) -> Result<Box<dyn Command>> {
    Ok(Box::new(RemoveCommand::new(required_attr(
        markup, element, "match",
    )?)))
}

fn build_call_module(
    _: &CommandParser,
    markup: &DocumentTree,
    element: NodeId,
) -> Result<Box<dyn Command>> {
    Ok(Box::new(CallModuleCommand::new(required_attr(
        markup, element, "module",
    )?)))
}

fn build_break(_: &CommandParser, _: &DocumentTree, _: NodeId) -> Result<Box<dyn Command>> {
    Ok(Box::new(BreakCommand))
}
