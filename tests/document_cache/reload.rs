//! Reload and write-back across requests

use crate::common::*;
use std::sync::Arc;
use workdoc::{AssignCommand, CommandList, DocumentState};

fn set_status(value: &str) -> CommandList {
    CommandList::new().with(AssignCommand::new(":{orders}/STATUS", value))
}

fn status_of(store: &MemoryStore) -> Option<String> {
    let tree = committed_tree(store, "orders")?;
    let status = *tree.child_elements(tree.root(), "STATUS").ok()?.first()?;
    tree.text(status).ok()?.map(str::to_string)
}

#[test]
fn first_request_creates_and_commits_document() {
    let h = Harness::new();
    let (mut request, _) = h.request("orders", "orders", "ORDERS");

    let flow = request.execute(&set_status("open")).unwrap();

    assert_eq!(flow, ControlFlow::Continue);
    assert_eq!(status_of(&h.store).as_deref(), Some("open"));
    assert_eq!(h.store.commit_count(), 1);
    assert!(!h.store.is_locked(&row("orders")));
}

#[test]
fn write_stamps_new_change_number() {
    let h = Harness::new();
    seed(&h.store, "orders", &orders_doc().with_attr("change-number", "v1"));

    let (mut request, _) = h.request("orders", "orders", "ORDERS");
    request.execute(&set_status("open")).unwrap();

    let tree = committed_tree(&h.store, "orders").unwrap();
    let stamped = tree.attr(tree.root(), "change-number").unwrap().unwrap();
    assert_ne!(stamped, "v1");
    assert!(!stamped.is_empty());

    let entry = h.manager.get(&location("orders", "ORDERS").cache_key()).unwrap();
    assert_eq!(entry.change_version().as_deref(), Some(stamped));
    assert_eq!(entry.state(), DocumentState::Closed);
}

#[test]
fn unchanged_request_keeps_cached_tree_and_writes_nothing() {
    let h = Harness::new();
    seed(&h.store, "orders", &orders_doc().with_attr("change-number", "v1"));
    let key = location("orders", "ORDERS").cache_key();

    let (mut first, _) = h.request("orders", "orders", "ORDERS");
    first
        .execute(&CommandList::new().with(AssignCommand::new("SEEN", "string(:{orders}/ORDER[1])")))
        .unwrap();
    let cached = h.manager.get(&key).unwrap().tree().unwrap();

    let (mut second, _) = h.request("orders", "orders", "ORDERS");
    second
        .execute(&CommandList::new().with(AssignCommand::new("SEEN", "string(:{orders}/ORDER[2])")))
        .unwrap();

    let entry = h.manager.get(&key).unwrap();
    assert!(Arc::ptr_eq(&cached, &entry.tree().unwrap()));
    assert_eq!(entry.change_version().as_deref(), Some("v1"));
    assert_eq!(h.store.lob_write_count(), 0);
}

#[test]
fn foreign_write_triggers_reload_and_freezes_old_snapshot() {
    let h = Harness::new();
    let other = h.sibling();
    let key = location("orders", "ORDERS").cache_key();

    let (mut first, _) = h.request("orders", "orders", "ORDERS");
    first.execute(&set_status("open")).unwrap();
    let before = h.manager.get(&key).unwrap().tree().unwrap();

    // Another runtime with its own cache updates the row
    let (mut foreign, _) = other.request("orders", "orders", "ORDERS");
    foreign.execute(&set_status("shipped")).unwrap();
    assert_eq!(status_of(&h.store).as_deref(), Some("shipped"));

    let (mut again, _) = h.request("orders", "orders", "ORDERS");
    again
        .execute(&CommandList::new().with(AssignCommand::new("SEEN", "string(:{orders}/STATUS)")))
        .unwrap();
    let after = h.manager.get(&key).unwrap().tree().unwrap();

    assert!(!Arc::ptr_eq(&before, &after));
    assert_ne!(before.read().id(), after.read().id());

    let old = before.read();
    assert!(old.is_read_only());
    let status = old.child_elements(old.root(), "STATUS").unwrap()[0];
    assert_eq!(old.text(status).unwrap(), Some("open"));

    let new = after.read();
    let status = new.child_elements(new.root(), "STATUS").unwrap()[0];
    assert_eq!(new.text(status).unwrap(), Some("shipped"));
}

#[test]
fn fatal_error_rolls_back_and_purges_entry() {
    let h = Harness::new();
    seed(&h.store, "orders", &orders_doc().with_attr("change-number", "v1"));

    let (mut request, _) = h.request("orders", "orders", "ORDERS");
    let commands = set_status("open").with(AssignCommand::new(":{missing}/X", "1"));
    let err = request.execute(&commands).unwrap_err();

    assert!(matches!(err, Error::UndefinedLabel { .. }));
    assert!(h.manager.is_empty());
    assert_eq!(status_of(&h.store), None);
    assert_eq!(h.store.commit_count(), 0);
    assert!(!h.store.is_locked(&row("orders")));
}

#[test]
fn request_after_abort_starts_from_store() {
    let h = Harness::new();
    seed(&h.store, "orders", &orders_doc().with_attr("change-number", "v1"));

    let (mut failed, _) = h.request("orders", "orders", "ORDERS");
    let _ = failed.execute(&set_status("lost").with(AssignCommand::new(":{missing}/X", "1")));

    let (mut retry, _) = h.request("orders", "orders", "ORDERS");
    retry.execute(&set_status("kept")).unwrap();
    assert_eq!(status_of(&h.store).as_deref(), Some("kept"));
    assert_eq!(h.manager.len(), 1);
}
