//! Contextual labels set, scoped and cleared by scripts

use crate::common::*;

fn code_of(request: &Request, label: &str) -> Option<String> {
    request
        .context()
        .table()
        .get(label)
        .and_then(|node| node.attr("code").ok().flatten())
}

#[test]
fn for_each_updates_every_item_and_drops_item_label() {
    let h = Harness::new();
    seed(&h.store, "orders", &orders_doc());
    let (mut request, _) = h.request("orders", "orders", "ORDERS");

    let commands = script(
        SerialNode::new("do").with_child(
            SerialNode::new("for-each")
                .with_attr("xpath", ":{orders}/ORDER")
                .with_attr("item", "order")
                .with_child(
                    SerialNode::new("assign")
                        .with_attr("target", ":{order}/SEEN")
                        .with_attr("value", "yes"),
                ),
        ),
    );
    request.execute(&commands).unwrap();

    assert!(request.context().table().get("order").is_none());
    let tree = committed_tree(&h.store, "orders").unwrap();
    let orders = tree.child_elements(tree.root(), "ORDER").unwrap();
    assert_eq!(orders.len(), 2);
    for order in orders {
        let seen = tree.child_elements(order, "SEEN").unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(tree.text(seen[0]).unwrap(), Some("yes"));
    }
}

#[test]
fn localise_removes_additions_but_keeps_rebinding() {
    let h = Harness::new();
    seed(&h.store, "orders", &orders_doc());
    let (mut request, _) = h.request("orders", "orders", "ORDERS");

    let commands = script(
        SerialNode::new("do")
            .with_child(
                SerialNode::new("context-set")
                    .with_attr("name", "current")
                    .with_attr("xpath", ":{orders}/ORDER[1]"),
            )
            .with_child(
                SerialNode::new("context-localise")
                    .with_attr("purpose", "pricing")
                    .with_child(
                        SerialNode::new("context-set")
                            .with_attr("name", "current")
                            .with_attr("xpath", ":{orders}/ORDER[@code='B']"),
                    )
                    .with_child(
                        SerialNode::new("context-set")
                            .with_attr("name", "scratch")
                            .with_attr("xpath", ":{orders}/ORDER[1]"),
                    ),
            ),
    );
    request.execute(&commands).unwrap();

    assert_eq!(code_of(&request, "current").as_deref(), Some("B"));
    assert!(request.context().table().get("scratch").is_none());
    assert!(!request.context().table().is_localised());
}

#[test]
fn clearing_a_document_label_fails_the_request() {
    let h = Harness::new();
    seed(&h.store, "orders", &orders_doc());
    let (mut request, _) = h.request("orders", "orders", "ORDERS");

    let commands = script(
        SerialNode::new("do")
            .with_child(
                SerialNode::new("assign")
                    .with_attr("target", ":{orders}/STATUS")
                    .with_attr("value", "open"),
            )
            .with_child(SerialNode::new("context-clear").with_attr("name", "orders")),
    );
    let err = request.execute(&commands).unwrap_err();

    assert!(matches!(err, Error::NotRemovable { .. }));
    assert!(h.manager.is_empty());
    assert_eq!(h.store.lob_write_count(), 0);
}

#[test]
fn cleared_label_is_undefined_afterwards() {
    let h = Harness::new();
    seed(&h.store, "orders", &orders_doc());
    let (mut request, _) = h.request("orders", "orders", "ORDERS");

    let commands = script(
        SerialNode::new("do")
            .with_child(
                SerialNode::new("context-set")
                    .with_attr("name", "first")
                    .with_attr("xpath", ":{orders}/ORDER[1]"),
            )
            .with_child(SerialNode::new("context-clear").with_attr("name", "first"))
            .with_child(
                SerialNode::new("assign")
                    .with_attr("target", ":{first}/X")
                    .with_attr("value", "1"),
            ),
    );
    let err = request.execute(&commands).unwrap_err();
    assert!(matches!(err, Error::UndefinedLabel { .. }));
}

#[test]
fn creating_assign_is_idempotent() {
    let h = Harness::new();
    let (mut request, _) = h.request("orders", "orders", "ORDERS");

    let assign = SerialNode::new("assign")
        .with_attr("target", ":{orders}/HEADER/TOTAL")
        .with_attr("value", "10");
    let commands = script(
        SerialNode::new("do")
            .with_child(assign.clone())
            .with_child(assign.with_attr("value", "10")),
    );
    request.execute(&commands).unwrap();

    let tree = committed_tree(&h.store, "orders").unwrap();
    let headers = tree.child_elements(tree.root(), "HEADER").unwrap();
    assert_eq!(headers.len(), 1);
    assert_eq!(tree.child_elements(headers[0], "TOTAL").unwrap().len(), 1);
}

#[test]
fn remove_drops_matched_nodes() {
    let h = Harness::new();
    seed(&h.store, "orders", &orders_doc());
    let (mut request, _) = h.request("orders", "orders", "ORDERS");

    let commands = script(
        SerialNode::new("do")
            .with_child(SerialNode::new("remove").with_attr("match", ":{orders}/ORDER[@code='A']")),
    );
    request.execute(&commands).unwrap();

    let tree = committed_tree(&h.store, "orders").unwrap();
    let orders = tree.child_elements(tree.root(), "ORDER").unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(tree.attr(orders[0], "code").unwrap(), Some("B"));
}
