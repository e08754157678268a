mod helpers;

use helpers::{decision, test_store, warning};
use lore::config::SemanticConfig;
use lore::index::{DecisionFilter, DerivedIndex, FileFilter, SearchIndex, WarningFilter};
use lore::semantic::DocType;
use lore::store::types::{
    FileIndex, NewConversation, NewFeature, NewInsight, NewPattern, Severity,
};
use lore::store::KnowledgeStore;

fn file(path: &str, summary: &str) -> FileIndex {
    FileIndex {
        path: path.into(),
        summary: summary.into(),
        exports: vec!["login".into()],
        imports: vec![],
        language: Some("rust".into()),
        patterns: vec![],
        content_hash: "abc123".into(),
        indexed_at: "2026-01-01T00:00:00Z".into(),
    }
}

fn populate(store: &KnowledgeStore) {
    store
        .add_decision(decision("Use JWT for auth", Some("auth-v2")))
        .unwrap();
    store
        .add_decision(decision("Postgres for persistent storage", None))
        .unwrap();
    store
        .add_warning(lore::store::types::NewWarning {
            severity: Some(Severity::Critical),
            feature: Some("auth-v2".into()),
            ..warning("JWT secret must never be logged")
        })
        .unwrap();
    store
        .add_insight(NewInsight {
            content: "Most login failures come from clock skew".into(),
            ..Default::default()
        })
        .unwrap();
    store
        .add_pattern(NewPattern {
            name: "Repository".into(),
            description: "Database access goes through repository structs".into(),
            ..Default::default()
        })
        .unwrap();
    store
        .save_file_indexes_bulk(vec![
            file("src/auth.rs", "JWT issuance and validation"),
            file("src/db.rs", "Postgres connection pool"),
        ])
        .unwrap();
    store
        .create_feature(NewFeature {
            id: "auth-v2".into(),
            current_state: "refresh flow pending".into(),
            ..Default::default()
        })
        .unwrap();
    store
        .save_conversation(
            "auth-v2",
            NewConversation {
                summary: "Agreed on JWT expiry".into(),
                ..Default::default()
            },
        )
        .unwrap();
    store
        .create_feature(NewFeature {
            id: "billing".into(),
            ..Default::default()
        })
        .unwrap();
    store.archive_feature("billing").unwrap();
}

fn rebuild_everything(index: &SearchIndex, store: &KnowledgeStore) {
    let mut report = index.rebuild_from(store).unwrap();
    report.merge(
        index
            .semantic(&SemanticConfig::default())
            .rebuild_from(store)
            .unwrap(),
    );
    assert!(report.is_clean(), "unexpected failures: {:?}", report.failures);
}

#[test]
fn rebuild_twice_produces_identical_tables() {
    let (tmp, store) = test_store();
    populate(&store);
    let index = SearchIndex::open(tmp.path().join("index.db")).unwrap();

    rebuild_everything(&index, &store);
    let first = index.dump().unwrap();
    rebuild_everything(&index, &store);
    let second = index.dump().unwrap();

    assert_eq!(first, second);
    let stats = index.stats().unwrap();
    assert_eq!(stats.decisions, 2);
    assert_eq!(stats.warnings, 1);
    assert_eq!(stats.files, 2);
    assert_eq!(stats.features, 2);
    // 2 decisions, 1 warning, 1 insight, 1 pattern, 2 files, 1 conversation
    assert_eq!(stats.semantic_documents, 8);
}

#[test]
fn rebuild_report_counts_collections() {
    let (_tmp, store) = test_store();
    populate(&store);
    let index = SearchIndex::open_in_memory().unwrap();

    let report = index.rebuild(&store).unwrap();
    assert_eq!(report.decisions, 2);
    assert_eq!(report.warnings, 1);
    assert_eq!(report.files, 2);
    assert_eq!(report.features, 2);
    assert_eq!(report.indexed(), 7);
    assert!(report.is_clean());
}

#[test]
fn direct_indexing_matches_rebuild() {
    let (_tmp, store) = test_store();
    let jwt = store
        .add_decision(decision("Use JWT for auth", Some("auth-v2")))
        .unwrap();
    let other = store
        .add_decision(decision("JWT refresh tokens live one week", None))
        .unwrap();
    let w = store.add_warning(warning("JWT clock skew")).unwrap();
    let f = file("src/auth.rs", "JWT issuance");
    store.save_file_index(f.clone()).unwrap();

    let direct = SearchIndex::open_in_memory().unwrap();
    direct.index_decision(&jwt).unwrap();
    direct.index_decision(&other).unwrap();
    direct.index_warning(&w).unwrap();
    direct.index_file(&f).unwrap();

    let rebuilt = SearchIndex::open_in_memory().unwrap();
    rebuilt.rebuild(&store).unwrap();

    for query in ["JWT", "jwt auth", "refresh", "tok*"] {
        assert_eq!(
            direct
                .search_decisions(query, &DecisionFilter::default(), None)
                .unwrap(),
            rebuilt
                .search_decisions(query, &DecisionFilter::default(), None)
                .unwrap(),
            "decisions differ for {query:?}"
        );
        assert_eq!(
            direct
                .search_warnings(query, &WarningFilter::default(), None)
                .unwrap(),
            rebuilt
                .search_warnings(query, &WarningFilter::default(), None)
                .unwrap()
        );
        assert_eq!(
            direct.search_files(query, &FileFilter::default(), None).unwrap(),
            rebuilt.search_files(query, &FileFilter::default(), None).unwrap()
        );
    }
}

#[test]
fn rebuild_drops_rows_missing_from_store() {
    let (_tmp, store) = test_store();
    let kept = store.add_decision(decision("Use JWT for auth", None)).unwrap();
    let index = SearchIndex::open_in_memory().unwrap();

    let mut phantom = kept.clone();
    phantom.id = "dec-phantom".into();
    index.index_decision(&phantom).unwrap();
    index.rebuild(&store).unwrap();

    let hits = index
        .search_decisions("JWT", &DecisionFilter::default(), None)
        .unwrap();
    assert_eq!(hits, vec![kept]);
}

#[test]
fn corrupt_collection_is_reported_not_fatal() {
    let (_tmp, store) = test_store();
    store.add_decision(decision("Use JWT for auth", None)).unwrap();
    std::fs::write(store.layout().warnings(), "{ not json").unwrap();

    let index = SearchIndex::open_in_memory().unwrap();
    let report = index.rebuild(&store).unwrap();
    assert_eq!(report.decisions, 1);
    assert_eq!(report.warnings, 0);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].starts_with("warning"));
}

#[test]
fn malformed_record_does_not_hide_its_siblings() {
    let (_tmp, store) = test_store();
    let kept = store.add_decision(decision("Use JWT for auth", None)).unwrap();
    let path = store.layout().decisions();
    let mut raw: Vec<serde_json::Value> =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    raw.push(serde_json::json!({"id": "dec-bad", "content": "no timestamp"}));
    std::fs::write(&path, serde_json::to_vec_pretty(&raw).unwrap()).unwrap();

    store
        .create_feature(NewFeature {
            id: "auth-v2".into(),
            ..Default::default()
        })
        .unwrap();
    store
        .create_feature(NewFeature {
            id: "corrupt".into(),
            ..Default::default()
        })
        .unwrap();
    std::fs::write(
        store.layout().feature_dir("corrupt").join("meta.json"),
        "{ not json",
    )
    .unwrap();

    let index = SearchIndex::open_in_memory().unwrap();
    let report = index.rebuild(&store).unwrap();
    assert_eq!(report.decisions, 1);
    assert_eq!(report.features, 1);
    assert_eq!(report.failures.len(), 2, "{:?}", report.failures);
    assert!(report.failures[0].starts_with("decision: "));
    assert!(report.failures[0].contains("dec-bad"));
    assert!(report.failures[1].starts_with("feature: "));

    let hits = index
        .search_decisions("JWT", &DecisionFilter::default(), None)
        .unwrap();
    assert_eq!(hits, vec![kept]);

    let semantic = index
        .semantic(&SemanticConfig::default())
        .rebuild_from(&store)
        .unwrap();
    assert_eq!(semantic.semantic_documents, 1);
    assert_eq!(semantic.failures.len(), 1);
}

#[test]
fn semantic_search_after_rebuild() {
    let (_tmp, store) = test_store();
    populate(&store);
    let index = SearchIndex::open_in_memory().unwrap();
    rebuild_everything(&index, &store);

    let semantic = index.semantic(&SemanticConfig::default());
    let hits = semantic.search("postgres storage", None, 5).unwrap();
    assert!(!hits.is_empty());
    assert!(hits[0].content.contains("Postgres"));

    let files = semantic
        .search("jwt issuance", Some(DocType::File), 5)
        .unwrap();
    assert_eq!(files[0].id, "src/auth.rs");
}
