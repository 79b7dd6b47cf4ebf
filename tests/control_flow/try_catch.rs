//! try / catch / finally through whole requests

use crate::common::*;

fn assign(target: &str, value: &str) -> SerialNode {
    SerialNode::new("assign")
        .with_attr("target", target)
        .with_attr("value", value)
}

fn throw(code: &str) -> SerialNode {
    SerialNode::new("throw").with_attr("code", code)
}

fn do_block(children: Vec<SerialNode>) -> SerialNode {
    children
        .into_iter()
        .fold(SerialNode::new("do"), SerialNode::with_child)
}

fn catch(codes: &str, children: Vec<SerialNode>) -> SerialNode {
    children
        .into_iter()
        .fold(SerialNode::new("catch").with_attr("codes", codes), SerialNode::with_child)
}

fn finally(children: Vec<SerialNode>) -> SerialNode {
    children
        .into_iter()
        .fold(SerialNode::new("finally"), SerialNode::with_child)
}

fn try_block(parts: Vec<SerialNode>) -> SerialNode {
    parts
        .into_iter()
        .fold(SerialNode::new("try"), SerialNode::with_child)
}

fn text_at(store: &MemoryStore, name: &str) -> Option<String> {
    let tree = committed_tree(store, "orders")?;
    let node = *tree.child_elements(tree.root(), name).ok()?.first()?;
    tree.text(node).ok()?.map(str::to_string)
}

#[test]
fn caught_code_is_published_and_request_commits() {
    let h = Harness::new();
    let (mut request, _) = h.request("orders", "orders", "ORDERS");

    let commands = script(do_block(vec![try_block(vec![
        do_block(vec![
            assign(":{orders}/STATUS", "started"),
            throw("BAD_INPUT").with_attr("message", "quantity must be positive"),
            assign(":{orders}/STATUS", "unreachable"),
        ]),
        catch(
            "NOT_FOUND BAD_INPUT",
            vec![
                assign(":{orders}/ERROR", "string(:{sys}/exceptions/current-code)"),
                assign(":{orders}/REASON", "string(:{sys}/exceptions/current-message)"),
            ],
        ),
    ])]));
    let flow = request.execute(&commands).unwrap();

    assert_eq!(flow, ControlFlow::Continue);
    assert_eq!(text_at(&h.store, "STATUS").as_deref(), Some("started"));
    assert_eq!(text_at(&h.store, "ERROR").as_deref(), Some("BAD_INPUT"));
    assert_eq!(
        text_at(&h.store, "REASON").as_deref(),
        Some("quantity must be positive")
    );
}

#[test]
fn finally_runs_after_success() {
    let h = Harness::new();
    let (mut request, _) = h.request("orders", "orders", "ORDERS");

    let commands = script(do_block(vec![try_block(vec![
        do_block(vec![assign(":{orders}/STATUS", "ok")]),
        catch("OTHERS", vec![assign(":{orders}/STATUS", "failed")]),
        finally(vec![assign(":{orders}/DONE", "true")]),
    ])]));
    request.execute(&commands).unwrap();

    assert_eq!(text_at(&h.store, "STATUS").as_deref(), Some("ok"));
    assert_eq!(text_at(&h.store, "DONE").as_deref(), Some("true"));
}

#[test]
fn finally_signal_overrides_and_aborts_request() {
    let h = Harness::new();
    let (mut request, _) = h.request("orders", "orders", "ORDERS");

    let commands = script(do_block(vec![
        assign(":{orders}/STATUS", "started"),
        try_block(vec![
            do_block(vec![throw("FIRST")]),
            catch("FIRST", vec![]),
            finally(vec![throw("CLEANUP_FAILED")]),
        ]),
    ]));
    let flow = request.execute(&commands).unwrap();

    assert_eq!(flow.thrown_code(), Some("CLEANUP_FAILED"));
    assert!(h.manager.is_empty());
    assert_eq!(h.store.commit_count(), 0);
    assert!(committed_tree(&h.store, "orders").is_none());
}

#[test]
fn uncaught_code_escapes_nested_try_to_outer_others() {
    let h = Harness::new();
    let (mut request, _) = h.request("orders", "orders", "ORDERS");

    let inner = try_block(vec![
        do_block(vec![throw("INNER")]),
        catch("INNER", vec![throw("RETHROWN")]),
        finally(vec![assign(":{orders}/INNER_DONE", "yes")]),
    ]);
    let commands = script(do_block(vec![try_block(vec![
        do_block(vec![inner]),
        catch(
            "OTHERS",
            vec![assign(":{orders}/CAUGHT", "string(:{sys}/exceptions/current-code)")],
        ),
    ])]));
    assert_eq!(request.execute(&commands).unwrap(), ControlFlow::Continue);

    assert_eq!(text_at(&h.store, "INNER_DONE").as_deref(), Some("yes"));
    assert_eq!(text_at(&h.store, "CAUGHT").as_deref(), Some("RETHROWN"));
}

#[test]
fn call_module_skips_finally() {
    let h = Harness::new();
    let (mut request, _) = h.request("orders", "orders", "ORDERS");

    let commands = script(do_block(vec![
        assign(":{orders}/STATUS", "routing"),
        try_block(vec![
            do_block(vec![SerialNode::new("call-module").with_attr("module", "NEXT_STEP")]),
            finally(vec![assign(":{orders}/DONE", "true")]),
        ]),
        assign(":{orders}/AFTER", "unreachable"),
    ]));
    let flow = request.execute(&commands).unwrap();

    assert!(flow.is_call_stack_transformation());
    assert_eq!(text_at(&h.store, "STATUS").as_deref(), Some("routing"));
    assert_eq!(text_at(&h.store, "DONE"), None);
    assert_eq!(text_at(&h.store, "AFTER"), None);
}

#[test]
fn fatal_error_is_not_caught() {
    let h = Harness::new();
    let (mut request, _) = h.request("orders", "orders", "ORDERS");

    let commands = script(do_block(vec![try_block(vec![
        do_block(vec![
            assign(":{orders}/STATUS", "started"),
            SerialNode::new("context-clear").with_attr("name", "orders"),
        ]),
        catch("OTHERS", vec![assign(":{orders}/STATUS", "caught")]),
    ])]));
    let err = request.execute(&commands).unwrap_err();

    assert!(matches!(err, Error::NotRemovable { .. }));
    assert!(committed_tree(&h.store, "orders").is_none());
}
