use std::collections::BTreeMap;

use notation_sync::bareme::{Bareme, BaremeLibrary, Criterion};
use notation_sync::notation::{CriterionValue, NotationStore, CURRENT_SCOPE};
use notation_sync::{CellKey, DraftCellLedger, ScoringSession, SyncConfig};

fn technique_artistique() -> Bareme {
    Bareme {
        id: "concours".to_string(),
        name: "Concours".to_string(),
        description: None,
        is_official: false,
        hide_totals_until_all_scored: false,
        criteria: vec![
            Criterion::numeric("montage", "Montage", 10.0, Some("Technique")),
            Criterion::numeric("encodage", "Encodage", 5.0, Some("Technique")),
            Criterion::numeric("idee", "Idée", 10.0, Some("Artistique")),
        ],
        category_colors: BTreeMap::new(),
        total_points: 25.0,
        created_at: String::new(),
        updated_at: String::new(),
    }
}

fn store_with_depth(depth: usize) -> NotationStore {
    let mut config = SyncConfig::default();
    config.history.depth = depth;
    NotationStore::with_library(BaremeLibrary::with_active(technique_artistique()), &config)
}

#[test]
fn test_draft_commit_accepts_comma_and_dot() {
    let mut store = store_with_depth(100);
    let mut ledger = DraftCellLedger::new();

    for (clip, raw) in [("c1", "3,5"), ("c2", "3.5")] {
        let key = CellKey::new(clip, "montage", CURRENT_SCOPE);
        ledger.set(key.clone(), raw);
        let applied = ledger.commit(&key, |value| {
            store.apply_criterion_value(clip, "montage", CURRENT_SCOPE, CriterionValue::Number(value))
        });
        assert_eq!(applied, Some(true));
        assert!(ledger.get(&key).is_none(), "draft for {} should be cleared", clip);
        assert_eq!(
            store.note_for_clip(clip).unwrap().scores["montage"].value,
            CriterionValue::Number(3.5)
        );
    }
}

#[test]
fn test_non_numeric_draft_is_dropped_without_touching_notes() {
    let mut store = store_with_depth(100);
    let mut ledger = DraftCellLedger::new();
    let key = CellKey::new("c1", "montage", CURRENT_SCOPE);

    ledger.set(key.clone(), "abc");
    let applied = ledger.commit(&key, |value| {
        store.apply_criterion_value("c1", "montage", CURRENT_SCOPE, CriterionValue::Number(value))
    });

    assert_eq!(applied, None);
    assert!(ledger.is_empty());
    assert!(store.note_for_clip("c1").is_none());
    assert_eq!(store.history_len(), 0);
}

#[test]
fn test_undo_on_empty_history_is_noop() {
    let mut store = store_with_depth(100);
    store.apply_criterion_value("c1", "montage", CURRENT_SCOPE, 4.0.into());
    let data = store.get_notes_data();
    store.load_notes(data.clone());

    assert!(!store.undo());
    assert_eq!(store.get_notes_data(), data);
}

#[test]
fn test_notes_round_trip_through_serialized_form() {
    let mut store = store_with_depth(100);
    store.apply_criterion_value("c1", "montage", CURRENT_SCOPE, "7,5".into());
    store.apply_criterion_value("c1", "encodage", CURRENT_SCOPE, "abc".into());
    store.set_text_notes("c1", "1:02 bon raccord");
    store.set_category_note("c2", "Artistique", "original");

    let data = store.get_notes_data();
    let json = serde_json::to_string(&data).unwrap();

    let mut reloaded = store_with_depth(100);
    reloaded.load_notes(serde_json::from_str(&json).unwrap());
    assert_eq!(reloaded.get_notes_data(), data);
    assert_eq!(reloaded.score_for_clip("c1"), Some(7.5));
}

#[test]
fn test_history_keeps_only_the_newest_snapshots() {
    let depth = 3;
    let mut store = store_with_depth(depth);
    for value in 1..=(depth + 1) {
        store.apply_criterion_value("c1", "montage", CURRENT_SCOPE, (value as f64).into());
    }
    for _ in 0..depth {
        assert!(store.undo());
    }
    assert_eq!(
        store.note_for_clip("c1").unwrap().scores["montage"].value,
        CriterionValue::Number(1.0)
    );
    assert!(!store.undo());
}

#[test]
fn test_category_total_for_named_judge() {
    let mut session = ScoringSession::with_library(
        BaremeLibrary::with_active(technique_artistique()),
        SyncConfig::default(),
    );
    session.create_project("Concours", "J1");
    session.set_current_scope("J1");

    session.stage_category_cell("C1", "Technique", "J1", "8");
    assert!(session.commit_category_cell("C1", "Technique", "J1").unwrap());

    let notation = session.notation();
    assert_eq!(notation.category_score("C1", "Technique", "J1"), 8.0);
    let note = notation.note_for_clip("C1").unwrap();
    assert_eq!(note.scores["montage"].value, CriterionValue::Number(5.5));
    assert_eq!(note.scores["encodage"].value, CriterionValue::Number(2.5));
    assert_eq!(notation.history_len(), 1);
    assert!(session.project().is_dirty());

    assert!(session.undo());
    assert_eq!(session.notation().category_score("C1", "Technique", "J1"), 0.0);
}
