//! Read-only documents

use crate::common::*;
use workdoc::{AssignCommand, CommandList, DocumentState};

#[test]
fn read_only_document_is_readable_but_never_written() {
    let h = Harness::new();
    seed(&h.store, "orders", &orders_doc().with_attr("change-number", "v1"));
    let loc = location("orders", "ORDERS").read_only(true);

    let (mut request, _) = h.request_at("orders", loc.clone());
    request
        .execute(&CommandList::new().with(AssignCommand::new("COUNT", "string(:{orders}/ORDER[2])")))
        .unwrap();

    assert_eq!(h.store.lob_write_count(), 0);
    assert!(!h.store.is_locked(&row("orders")));
    let entry = h.manager.get(&loc.cache_key()).unwrap();
    assert_eq!(entry.state(), DocumentState::Closed);
}

#[test]
fn mutating_read_only_document_fails_the_request() {
    let h = Harness::new();
    seed(&h.store, "orders", &orders_doc().with_attr("change-number", "v1"));
    let loc = location("orders", "ORDERS").read_only(true);

    let (mut request, _) = h.request_at("orders", loc.clone());
    let err = request
        .execute(&CommandList::new().with(AssignCommand::new(":{orders}/STATUS", "nope")))
        .unwrap_err();

    assert!(matches!(err, Error::ReadOnlyViolation { .. }));
    assert!(h.manager.get(&loc.cache_key()).is_none());
    assert_eq!(h.store.lob_write_count(), 0);
}

#[test]
fn read_only_and_writable_views_are_separate_entries() {
    let h = Harness::new();
    seed(&h.store, "orders", &orders_doc());
    let writable = location("orders", "ORDERS");
    let read_only = writable.clone().read_only(true);

    let a = h.manager.get_or_create(&writable, true);
    let b = h.manager.get_or_create(&read_only, true);

    assert_ne!(a.cache_key(), b.cache_key());
    assert_eq!(h.manager.len(), 2);
}
