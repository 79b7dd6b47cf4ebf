//! Script parsing with custom command factories

use crate::common::*;
use std::sync::Arc;
use workdoc::core::NodeId;
use workdoc::{Command, CommandFactory, FnFactory, PathContext};

/// Copies the text of one node to another
#[derive(Debug)]
struct CopyCommand {
    from: String,
    to: String,
}

impl Command for CopyCommand {
    fn name(&self) -> &str {
        "copy"
    }

    fn run(&self, ctx: &mut RequestContext) -> workdoc::Result<ControlFlow> {
        let value = ctx.table_mut().resolve_string(&self.from, PathContext::Default)?;
        let node = ctx.table_mut().resolve_one(&self.to, PathContext::Default, true)?;
        let mut tree = node.tree().write();
        tree.set_text(node.node(), value)?;
        Ok(ControlFlow::Continue)
    }
}

struct CopyFactory;

impl CommandFactory for CopyFactory {
    fn element_names(&self) -> &[&'static str] {
        &["copy"]
    }

    fn create(
        &self,
        _parser: &CommandParser,
        markup: &DocumentTree,
        element: NodeId,
    ) -> workdoc::Result<Box<dyn Command>> {
        let get = |name: &str| -> workdoc::Result<String> {
            markup
                .attr(element, name)?
                .map(str::to_string)
                .ok_or_else(|| Error::command_syntax("copy", format!("missing '{}'", name)))
        };
        Ok(Box::new(CopyCommand {
            from: get("from")?,
            to: get("to")?,
        }))
    }
}

fn mark(_: &CommandParser, _: &DocumentTree, _: NodeId) -> workdoc::Result<Box<dyn Command>> {
    Ok(Box::new(workdoc::AssignCommand::new(":{orders}/MARKED", "yes")))
}

fn parser() -> CommandParser {
    let mut parser = CommandParser::with_builtins();
    parser.register(Arc::new(CopyFactory));
    parser.register(Arc::new(FnFactory::new(&["mark"], mark)));
    parser
}

#[test]
fn custom_commands_run_alongside_builtins() {
    let h = Harness::new();
    seed(&h.store, "orders", &orders_doc());
    let (mut request, _) = h.request("orders", "orders", "ORDERS");

    let markup = DocumentTree::from_serial(
        &SerialNode::new("fm:do")
            .with_child(
                SerialNode::new("fm:assign")
                    .with_attr("target", ":{orders}/SOURCE")
                    .with_attr("value", "copied"),
            )
            .with_child(
                SerialNode::new("ext:copy")
                    .with_attr("from", ":{orders}/SOURCE")
                    .with_attr("to", ":{orders}/TARGET"),
            )
            .with_child(SerialNode::new("mark")),
    )
    .unwrap();
    let commands = parser().parse_document(&markup).unwrap();
    assert_eq!(commands.len(), 3);

    request.execute(&commands).unwrap();

    let tree = committed_tree(&h.store, "orders").unwrap();
    let target = tree.child_elements(tree.root(), "TARGET").unwrap()[0];
    assert_eq!(tree.text(target).unwrap(), Some("copied"));
    assert_eq!(tree.child_elements(tree.root(), "MARKED").unwrap().len(), 1);
}

#[test]
fn unknown_and_malformed_elements_are_rejected() {
    let parser = parser();

    let unknown = DocumentTree::from_serial(&SerialNode::new("do").with_child(SerialNode::new("launch"))).unwrap();
    assert!(matches!(
        parser.parse_document(&unknown),
        Err(Error::CommandSyntax { .. })
    ));

    let missing_attr =
        DocumentTree::from_serial(&SerialNode::new("do").with_child(SerialNode::new("copy").with_attr("from", "A")))
            .unwrap();
    assert!(matches!(
        parser.parse_document(&missing_attr),
        Err(Error::CommandSyntax { .. })
    ));

    let bad_try = DocumentTree::from_serial(
        &SerialNode::new("do").with_child(
            SerialNode::new("try")
                .with_child(SerialNode::new("catch").with_attr("codes", "X"))
                .with_child(SerialNode::new("do")),
        ),
    )
    .unwrap();
    assert!(matches!(
        parser.parse_document(&bad_try),
        Err(Error::CommandSyntax { .. })
    ));
    assert!(parser.handles("copy") && parser.handles("mark") && parser.handles("try"));
}
