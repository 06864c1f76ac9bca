mod test_support;

use std::sync::Arc;
use std::thread;

use ferrum_bindpath::{MemberResolver, Slot, TypeDescriptor};
use test_support::*;

#[test]
fn test_resolution_is_memoized() {
    let resolver = MemberResolver::new();
    let user = TypeDescriptor::of::<User>();

    let first = resolver.resolve(&user, "name", false).unwrap();
    let second = resolver.resolve(&user, "name", false).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(resolver.cached_slots(), 1);
}

#[test]
fn test_slot_kinds_and_declared_types() {
    let resolver = MemberResolver::new();
    let user = TypeDescriptor::of::<User>();

    let name = resolver.resolve(&user, "name", false).unwrap();
    assert!(matches!(*name, Slot::Field(_)));
    assert!(name.declared().is::<Option<String>>());

    let nickname = resolver.resolve(&user, "nickname", false).unwrap();
    assert!(matches!(*nickname, Slot::AccessorPair(_)));
    assert!(!nickname.is_read_only());

    let display = resolver.resolve(&user, "displayName", false).unwrap();
    assert!(display.is_read_only());

    let address = resolver.resolve(&user, "address", true).unwrap();
    assert!(matches!(*address, Slot::IndexedAccessorPair(_)));
    assert!(address.declared().is::<Address>());

    let id = resolver.resolve(&user, "id", false).unwrap();
    assert!(id.declared().is::<Option<i64>>());

    assert!(resolver.resolve(&user, "bogus", false).is_err());
}

#[test]
fn test_concurrent_resolution_converges() {
    let resolver = MemberResolver::new();
    let user = TypeDescriptor::of::<User>();

    let slots: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| resolver.resolve(&user, "addresses", false).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for slot in &slots[1..] {
        assert!(Arc::ptr_eq(&slots[0], slot));
    }
    assert_eq!(resolver.cached_slots(), 1);
}

#[test]
fn test_evaluator_is_shareable_across_threads() {
    let evaluator = evaluator();
    thread::scope(|scope| {
        for i in 0..4 {
            scope.spawn(move || {
                let mut action = Action::default();
                let city = format!("City {i}");
                evaluator
                    .set_value("user.addresses['home'].city", &mut action, &[city.as_str()], &no_attributes())
                    .unwrap();
                let read = evaluator
                    .get_value("user.addresses['home'].city", &action)
                    .unwrap()
                    .and_then(|v| v.get::<String>());
                assert_eq!(read, Some(city));
            });
        }
    });
}
