mod helpers;

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use helpers::{test_store, warning};
use lore::store::atomic;
use lore::store::KnowledgeStore;

#[test]
fn concurrent_warnings_are_all_kept() {
    let (_tmp, store) = test_store();
    let store = Arc::new(store);

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let store = Arc::clone(&store);
            thread::spawn(move || store.add_warning(warning(&format!("warning {i}"))).unwrap())
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let warnings = store.warnings().unwrap();
    assert_eq!(warnings.len(), 10);
    let ids: HashSet<&str> = warnings.iter().map(|w| w.id.as_str()).collect();
    assert_eq!(ids.len(), 10);
}

#[test]
fn concurrent_mixed_writes_do_not_interfere() {
    let (_tmp, store) = test_store();
    let store = Arc::new(store);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                if i % 2 == 0 {
                    store.add_warning(warning(&format!("w{i}"))).unwrap();
                } else {
                    store
                        .add_decision(helpers::decision(&format!("d{i}"), None))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.warnings().unwrap().len(), 4);
    assert_eq!(store.decisions().unwrap().len(), 4);
}

/// Two store instances on one directory (two processes) only share the
/// atomic rename. A read-modify-write that started before the other
/// instance's append overwrites it: the last rename wins.
#[test]
fn separate_instances_can_lose_an_update() {
    let (_tmp, first) = test_store();
    let second = KnowledgeStore::open(first.root()).with_author("other-process");
    first.add_warning(warning("existing")).unwrap();

    // `first` reads, `second` appends, then `first` writes back its stale view.
    let mut stale = first.warnings().unwrap();
    second.add_warning(warning("from the other process")).unwrap();
    assert_eq!(first.warnings().unwrap().len(), 2);

    let mut local = stale[0].clone();
    local.id = "warn-local".into();
    local.content = "from this process".into();
    stale.push(local);
    atomic::write_json(&first.layout().warnings(), &stale).unwrap();

    let contents: Vec<String> = first
        .warnings()
        .unwrap()
        .into_iter()
        .map(|w| w.content)
        .collect();
    assert_eq!(contents, vec!["existing", "from this process"]);
}
