use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use notation_sync::project::{load_project_file, write_project_atomic, Clip, JsonFileSink, ProjectData, ProjectSink};
use notation_sync::{AutosaveScheduler, AutosaveState, NotationError, ScoringSession, SyncConfig};
use tempfile::TempDir;

fn session_saving_to(path: &Path, ceiling_ms: u64) -> Arc<Mutex<ScoringSession>> {
    let mut config = SyncConfig::default();
    config.autosave.debounce_ceiling_ms = ceiling_ms;
    let mut session = ScoringSession::new(config);
    session.create_project("Concours", "Chloé");
    session.set_clips(vec![
        Clip::from_path("c1", "/videos/Kira-Starlight_Road.mp4", 0),
        Clip::from_path("c2", "/videos/Akito-Last_Light.mkv", 1),
    ]);
    session.set_file_path(path);
    Arc::new(Mutex::new(session))
}

fn saved_text(path: &Path, clip_id: &str) -> String {
    let data = load_project_file(path).unwrap();
    data.notes.get(clip_id).map(|n| n.text_notes.clone()).unwrap_or_default()
}

/// Writes to disk after a fixed delay, counting completed saves.
struct SlowFileSink {
    delay: Duration,
    saves: AtomicUsize,
}

impl ProjectSink for SlowFileSink {
    async fn save(&self, path: &Path, data: &ProjectData) -> Result<(), NotationError> {
        tokio::time::sleep(self.delay).await;
        write_project_atomic(data, path)?;
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn test_typing_burst_writes_file_once_after_debounce() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("concours.json");
    let session = session_saving_to(&path, 2500);
    let handle = AutosaveScheduler::spawn(session.clone(), Arc::new(JsonFileSink));

    for text in ["0", "0:", "0:4", "0:42", "0:42 raccord"] {
        session.lock().unwrap().set_text_notes("c1", text);
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    assert!(!path.exists());
    assert_eq!(handle.state(), AutosaveState::Scheduled);

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(saved_text(&path, "c1"), "0:42 raccord");
    assert!(!session.lock().unwrap().project().is_dirty());
    assert_eq!(handle.state(), AutosaveState::Idle);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_edit_during_save_keeps_project_dirty() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("concours.json");
    let session = session_saving_to(&path, 500);
    let sink = Arc::new(SlowFileSink {
        delay: Duration::from_secs(1),
        saves: AtomicUsize::new(0),
    });
    let handle = AutosaveScheduler::spawn(session.clone(), sink.clone());

    session.lock().unwrap().set_text_notes("c1", "first");
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert_eq!(handle.state(), AutosaveState::Saving);
    session.lock().unwrap().set_text_notes("c1", "second");

    tokio::time::sleep(Duration::from_millis(900)).await;
    assert_eq!(sink.saves.load(Ordering::SeqCst), 1);
    assert_eq!(saved_text(&path, "c1"), "first");
    assert!(session.lock().unwrap().project().is_dirty());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(sink.saves.load(Ordering::SeqCst), 2);
    assert_eq!(saved_text(&path, "c1"), "second");
    assert!(!session.lock().unwrap().project().is_dirty());

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_disabled_autosave_still_allows_manual_save() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("concours.json");
    let session = session_saving_to(&path, 2500);
    session.lock().unwrap().update_settings(|s| s.auto_save = false);
    let handle = AutosaveScheduler::spawn(session.clone(), Arc::new(JsonFileSink));

    session.lock().unwrap().set_text_notes("c2", "1:10 baisse de rythme");
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(!path.exists());
    assert_eq!(handle.state(), AutosaveState::Idle);

    handle.save_now().await.unwrap();
    assert_eq!(saved_text(&path, "c2"), "1:10 baisse de rythme");
    assert!(!session.lock().unwrap().project().is_dirty());

    handle.shutdown().await;
}
