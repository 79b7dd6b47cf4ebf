//! Document providers seen from the binding table

use crate::common::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use workdoc::context::StaticDocumentProvider;
use workdoc::core::share;
use workdoc::{DocumentProvider, PathContext, TreeRef};

/// Static provider counting lifecycle calls
struct Counting {
    inner: StaticDocumentProvider,
    loads: AtomicUsize,
    closes: AtomicUsize,
}

impl Counting {
    fn new(doc: &SerialNode) -> Arc<Self> {
        let tree = DocumentTree::from_serial(doc).unwrap();
        Arc::new(Counting {
            inner: StaticDocumentProvider::new(share(tree)),
            loads: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
        })
    }
}

impl DocumentProvider for Counting {
    fn load(&self, label: &str) -> workdoc::Result<TreeRef> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load(label)
    }

    fn close(&self) -> workdoc::Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn provider_loads_once_per_request() {
    init_tracing();
    let provider = Counting::new(&orders_doc());
    let mut ctx = RequestContext::new();
    ctx.bind_root(share(DocumentTree::create_empty("ROOT")));
    ctx.table_mut().register_provider("orders", provider.clone());

    let commands = script(
        SerialNode::new("do")
            .with_child(
                SerialNode::new("assign")
                    .with_attr("target", "FIRST")
                    .with_attr("value", "string(:{orders}/ORDER[1]/CODE)"),
            )
            .with_child(
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
    let mut request = Request::new(ctx);
    request.execute(&commands).unwrap();

    assert_eq!(provider.loads.load(Ordering::SeqCst), 1);
    assert_eq!(provider.closes.load(Ordering::SeqCst), 1);
}

#[test]
fn unreferenced_provider_is_never_loaded() {
    let provider = Counting::new(&orders_doc());
    let mut ctx = RequestContext::new();
    ctx.bind_root(share(DocumentTree::create_empty("ROOT")));
    ctx.table_mut().register_provider("orders", provider.clone());

    let commands = script(
        SerialNode::new("do").with_child(
            SerialNode::new("assign")
                .with_attr("target", "NOTE")
                .with_attr("value", "hello"),
        ),
    );
    Request::new(ctx).execute(&commands).unwrap();

    assert_eq!(provider.loads.load(Ordering::SeqCst), 0);
    assert_eq!(provider.closes.load(Ordering::SeqCst), 0);
}

#[test]
fn stable_ref_found_in_a_later_request() {
    let h = Harness::new();
    let (mut first, _) = h.request("orders", "orders", "ORDERS");
    first
        .execute(&script(
            SerialNode::new("do").with_child(
                SerialNode::new("assign")
                    .with_attr("target", ":{orders}/STATUS")
                    .with_attr("value", "open"),
            ),
        ))
        .unwrap();

    let stored = committed_tree(&h.store, "orders").unwrap();
    let status = stored.child_elements(stored.root(), "STATUS").unwrap()[0];
    let status_ref = stored.ref_of(status).unwrap().unwrap().to_string();

    // A fresh request finds the ref by loading the registered document
    let (mut second, _) = h.request("orders", "orders", "ORDERS");
    let table = second.context_mut().table_mut();
    assert!(!table.is_label_loaded("orders"));
    let found = table.find_by_ref(&status_ref).unwrap();
    assert_eq!(found.name().unwrap(), "STATUS");
    assert_eq!(found.text().unwrap().as_deref(), Some("open"));
    assert!(table.is_label_loaded("orders"));
    assert!(matches!(
        table.find_by_ref("no-such-ref"),
        Err(Error::NodeNotFound { .. })
    ));
    second.execute(&CommandList::new()).unwrap();
}

#[test]
fn absolute_path_of_created_node() {
    let h = Harness::new();
    seed(&h.store, "orders", &orders_doc());
    let (mut request, _) = h.request("orders", "orders", "ORDERS");
    let table = request.context_mut().table_mut();

    let path = table
        .absolute_path_of(":{orders}/ORDER[@code='B']/LINE", PathContext::Default)
        .unwrap();
    assert!(path.starts_with("/ORDERS"));
    assert!(path.ends_with("LINE"));

    let lines = table
        .resolve_all(":{orders}//LINE", PathContext::Default, false)
        .unwrap();
    assert_eq!(lines.len(), 1);
    request.execute(&CommandList::new()).unwrap();
}

#[test]
fn cardinality_errors_surface_from_scripts() {
    let h = Harness::new();
    seed(&h.store, "orders", &orders_doc());
    let (mut request, _) = h.request("orders", "orders", "ORDERS");

    let commands = script(
        SerialNode::new("do").with_child(
            SerialNode::new("context-set")
                .with_attr("name", "order")
                .with_attr("xpath", ":{orders}/ORDER"),
        ),
    );
    let err = request.execute(&commands).unwrap_err();
    assert!(err.is_cardinality());
    assert!(matches!(err, Error::TooMany { count: 2, .. }));
}
