//! Row lock contention within one runtime and between runtimes

use crate::common::*;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use workdoc::{AssignCommand, CommandList, DocumentState};

fn set_status(value: &str) -> CommandList {
    CommandList::new().with(AssignCommand::new(":{orders}/STATUS", value))
}

#[test]
fn nowait_contender_fails_and_holder_still_commits() {
    let h = Harness::new();
    let other = h.sibling();
    seed(&h.store, "orders", &orders_doc());

    // The holder loads the label and keeps its transaction open
    let (mut holder, _) = h.request("orders", "orders", "ORDERS");
    holder
        .context_mut()
        .table_mut()
        .load_document_label("orders")
        .unwrap();
    assert!(h.store.is_locked(&row("orders")));

    let (mut contender, _) = other.request("orders", "orders", "ORDERS");
    let err = contender.execute(&set_status("contended")).unwrap_err();
    assert!(err.is_lock_timeout());

    holder.execute(&set_status("held")).unwrap();
    assert!(!h.store.is_locked(&row("orders")));

    let (mut retry, _) = other.request("orders", "orders", "ORDERS");
    retry.execute(&set_status("retried")).unwrap();
}

#[test]
fn nowait_contender_sharing_the_cache_fails() {
    let h = Harness::new();
    seed(&h.store, "orders", &orders_doc());

    let (mut holder, _) = h.request("orders", "orders", "ORDERS");
    holder
        .context_mut()
        .table_mut()
        .load_document_label("orders")
        .unwrap();

    let same = h.clone();
    let contended = thread::spawn(move || {
        let (mut contender, _) = same.request("orders", "orders", "ORDERS");
        contender.execute(&set_status("contended")).map(|_| ())
    });
    let err = contended.join().unwrap().unwrap_err();
    assert!(err.is_lock_timeout());

    holder.execute(&set_status("held")).unwrap();
    let tree = committed_tree(&h.store, "orders").unwrap();
    let status = tree.child_elements(tree.root(), "STATUS").unwrap()[0];
    assert_eq!(tree.text(status).unwrap(), Some("held"));
    assert_eq!(h.manager.len(), 1);
}

#[test]
fn read_only_document_opens_concurrently_from_one_cache() {
    let h = Harness::new();
    seed(&h.store, "orders", &orders_doc().with_attr("change-number", "v1"));
    let loc = location("orders", "ORDERS").read_only(true);

    let (mut first, _) = h.request_at("orders", loc.clone());
    first
        .context_mut()
        .table_mut()
        .load_document_label("orders")
        .unwrap();

    let same = h.clone();
    let reader_loc = loc.clone();
    let reader = thread::spawn(move || {
        let (mut second, _) = same.request_at("orders", reader_loc);
        let read = CommandList::new().with(AssignCommand::new("CODE", "string(:{orders}/ORDER[2])"));
        second.execute(&read).map(|_| ())
    });
    reader.join().unwrap().unwrap();

    let entry = h.manager.get(&loc.cache_key()).unwrap();
    assert_eq!(entry.state(), DocumentState::Open);
    first.execute(&CommandList::new()).unwrap();
    assert_eq!(entry.state(), DocumentState::Closed);
    assert_eq!(h.store.lob_write_count(), 0);
}

#[test]
fn waiting_contender_sharing_the_cache_proceeds_after_commit() {
    let config = WorkDocConfig {
        lock_mode: "wait".to_string(),
        lock_timeout_ms: 5_000,
        ..WorkDocConfig::default()
    };
    let h = Harness::with_config(config);
    let other = h.clone();
    seed(&h.store, "orders", &orders_doc());

    let (mut holder, _) = h.request("orders", "orders", "ORDERS");
    holder
        .context_mut()
        .table_mut()
        .load_document_label("orders")
        .unwrap();

    let (started_tx, started_rx) = mpsc::channel();
    let waiter = thread::spawn(move || {
        let (mut request, _) = other.request("orders", "orders", "ORDERS");
        started_tx.send(()).unwrap();
        request.execute(&set_status("second")).map(|_| ())
    });

    started_rx.recv().unwrap();
    thread::sleep(Duration::from_millis(50));
    holder.execute(&set_status("first")).unwrap();

    waiter.join().unwrap().unwrap();
    let tree = committed_tree(&h.store, "orders").unwrap();
    let status = tree.child_elements(tree.root(), "STATUS").unwrap()[0];
    assert_eq!(tree.text(status).unwrap(), Some("second"));
}
