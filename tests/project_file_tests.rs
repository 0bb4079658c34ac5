use std::path::PathBuf;

use notation_sync::bridge::MarkerSource;
use notation_sync::notation::{CriterionValue, CURRENT_SCOPE};
use notation_sync::project::{load_project_file, write_project_atomic};
use notation_sync::{ScoringSession, SyncConfig};
use tempfile::TempDir;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn open_fixture() -> ScoringSession {
    let mut session = ScoringSession::new(SyncConfig::default());
    session
        .open_project_file(&fixture_path("sample_project.json"))
        .expect("Failed to open fixture");
    session
}

#[test]
fn test_open_fixture_loads_scores_and_judges() {
    let session = open_fixture();

    assert_eq!(session.notation().current_bareme().unwrap().id, "official-amv-2026");
    assert_eq!(session.notation().score_for_clip("clip-a"), Some(15.5));
    assert_eq!(session.notation().score_for_clip("clip-b"), None);

    let judges = session.notation().imported_judges();
    assert_eq!(judges.len(), 1);
    assert_eq!(judges[0].judge_name, "Bastien");
    assert_eq!(session.notation().imported_total(0, "clip-a"), Some(9.0));

    assert!(!session.project().is_dirty());
    assert_eq!(session.project().file_path(), Some(fixture_path("sample_project.json")));
}

#[test]
fn test_snake_case_clip_fields_are_accepted() {
    let session = open_fixture();
    let clips = session.project().clips();
    assert_eq!(clips.len(), 2);
    assert_eq!(clips[1].file_name, "Akito-Last_Light.mkv");
    assert_eq!(clips[1].display_name, "Last Light");
    assert!(clips[1].has_video());
}

#[test]
fn test_markers_come_from_every_comment_sorted_by_time() {
    let session = open_fixture();
    let overlay = session.overlay_markers();
    assert_eq!(overlay.clip_id.as_deref(), Some("clip-a"));

    let seconds: Vec<f64> = overlay.markers.iter().map(|m| m.seconds).collect();
    let expected = [42.0, 65.4, 70.0, 150.0];
    assert_eq!(seconds.len(), expected.len());
    for (got, want) in seconds.iter().zip(expected) {
        assert!((got - want).abs() < 1e-9, "marker at {} expected {}", got, want);
    }

    let frame_marker = &overlay.markers[1];
    assert_eq!(frame_marker.source, MarkerSource::Criterion);
    assert_eq!(frame_marker.criterion_id.as_deref(), Some("rythme-synchro"));
    assert_eq!(frame_marker.category.as_deref(), Some("MONTAGE"));
    assert_eq!(frame_marker.preview_text, "drop parfait");

    assert_eq!(overlay.markers[3].category.as_deref(), Some("VFX"));
    assert_eq!(overlay.markers[3].source, MarkerSource::Category);
}

#[test]
fn test_clip_info_uses_author_and_sorted_position() {
    let session = open_fixture();
    let info = session.clip_info().unwrap();
    assert_eq!(info.name, "Kira");
    // "Akito" sorts before "Kira".
    assert_eq!(info.index, 1);
    assert_eq!(info.total, 2);
    assert!(info.miniatures_enabled);
}

#[test]
fn test_save_and_reload_preserves_edits() {
    let mut session = open_fixture();
    session.apply_criterion_value("clip-b", "encodage", CURRENT_SCOPE, 2.0.into());
    session.set_text_notes("clip-b", "0:15 intro propre");
    assert!(session.project().is_dirty());

    let temp = TempDir::new().unwrap();
    let target = temp.path().join("nested").join("saved.json");
    write_project_atomic(&session.project_data().unwrap(), &target).unwrap();

    let reloaded = load_project_file(&target).unwrap();
    assert_eq!(reloaded.project.name, "Concours 2026");
    assert_eq!(reloaded.imported_judges[0].judge_name, "Bastien");
    let note = &reloaded.notes["clip-b"];
    assert_eq!(note.text_notes, "0:15 intro propre");
    assert_eq!(note.scores["encodage"].value, CriterionValue::Number(2.0));
}

#[test]
fn test_missing_file_reports_context() {
    let mut session = ScoringSession::new(SyncConfig::default());
    let err = session
        .open_project_file(&fixture_path("does_not_exist.json"))
        .unwrap_err();
    assert!(err.to_string().contains("Failed to read project file"));
    assert!(session.project().project().is_none());
}
