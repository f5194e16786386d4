use super::ExtensionFilter;
use crate::control::Command;
use crate::error::KioskError;
use notify_debouncer_mini::{new_debouncer, DebouncedEvent, DebouncedEventKind};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Quiet period before a burst of filesystem events is reported.
pub const DEBOUNCE: Duration = Duration::from_millis(500);

/// Whether a debounced batch touched any media file.
pub fn batch_matches(events: &[DebouncedEvent], filter: &ExtensionFilter) -> bool {
    events
        .iter()
        .any(|evt| evt.kind == DebouncedEventKind::Any && filter.matches(&evt.path))
}

/// Watch the media directory (non-recursive) and emit one `Rescan` per
/// debounced batch of create/modify/delete events on matching files.
///
/// # Errors
/// Returns `KioskError::Watcher` if the file watcher cannot be initialized.
pub async fn watch_media_dir(
    media_dir: PathBuf,
    filter: ExtensionFilter,
    tx: mpsc::Sender<Command>,
    cancel: CancellationToken,
) -> crate::error::Result<()> {
    let (notify_tx, mut notify_rx) = mpsc::channel::<()>(16);

    let mut debouncer = new_debouncer(
        DEBOUNCE,
        move |events: Result<Vec<DebouncedEvent>, notify::Error>| match events {
            Ok(evts) => {
                if batch_matches(&evts, &filter) {
                    // Called on the debouncer thread, outside the runtime.
                    let _ = notify_tx.blocking_send(());
                } else {
                    debug!("ignoring {} unrelated fs events", evts.len());
                }
            }
            Err(e) => {
                warn!("file watcher error: {e}");
            }
        },
    )
    .map_err(|e| KioskError::Watcher(e.to_string()))?;

    debouncer
        .watcher()
        .watch(&media_dir, notify::RecursiveMode::NonRecursive)
        .map_err(|e| KioskError::Watcher(format!("{}: {e}", media_dir.display())))?;
    info!("watching media dir: {}", media_dir.display());

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                info!("media watcher shutting down");
                return Ok(());
            }
            changed = notify_rx.recv() => {
                if changed.is_none() {
                    return Err(KioskError::Watcher("watcher thread stopped".to_string()));
                }
                info!("media dir changed, rescanning...");
                if tx.send(Command::Rescan).await.is_err() {
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(path: &str) -> DebouncedEvent {
        DebouncedEvent {
            path: PathBuf::from(path),
            kind: DebouncedEventKind::Any,
        }
    }

    #[test]
    fn batch_with_matching_file_triggers() {
        let filter = ExtensionFilter::new(["gif"]);
        let events = vec![event("/m/readme.txt"), event("/m/cat.GIF")];
        assert!(batch_matches(&events, &filter));
    }

    #[test]
    fn batch_without_matching_file_is_ignored() {
        let filter = ExtensionFilter::new(["gif"]);
        let events = vec![event("/m/readme.txt"), event("/m/.tmpX1y2Z3")];
        assert!(!batch_matches(&events, &filter));
    }

    struct Running {
        rx: mpsc::Receiver<Command>,
        cancel: CancellationToken,
        handle: tokio::task::JoinHandle<crate::error::Result<()>>,
    }

    impl Running {
        async fn start(dir: &std::path::Path) -> Self {
            let (tx, rx) = mpsc::channel(8);
            let cancel = CancellationToken::new();
            let handle = tokio::spawn(watch_media_dir(
                dir.to_path_buf(),
                ExtensionFilter::new(["gif"]),
                tx,
                cancel.clone(),
            ));
            // Give the watcher a moment to register before touching the dir.
            tokio::time::sleep(Duration::from_millis(200)).await;
            Self { rx, cancel, handle }
        }

        async fn expect_rescan(&mut self) {
            let cmd = tokio::time::timeout(Duration::from_secs(5), self.rx.recv())
                .await
                .expect("no rescan within timeout");
            assert!(matches!(cmd, Some(Command::Rescan)));
        }

        async fn expect_quiet(&mut self) {
            let waited = tokio::time::timeout(DEBOUNCE * 3, self.rx.recv()).await;
            assert!(waited.is_err(), "unexpected command: {waited:?}");
        }

        async fn stop(self) {
            self.cancel.cancel();
            self.handle.await.unwrap().unwrap();
        }
    }

    #[tokio::test]
    async fn new_file_triggers_rescan() {
        let dir = tempfile::tempdir().unwrap();
        let mut watcher = Running::start(dir.path()).await;

        std::fs::write(dir.path().join("new.gif"), b"GIF89a").unwrap();

        watcher.expect_rescan().await;
        watcher.stop().await;
    }

    #[tokio::test]
    async fn deleted_file_triggers_rescan() {
        let dir = tempfile::tempdir().unwrap();
        let gif = dir.path().join("old.gif");
        std::fs::write(&gif, b"GIF89a").unwrap();
        let mut watcher = Running::start(dir.path()).await;

        std::fs::remove_file(&gif).unwrap();

        watcher.expect_rescan().await;
        watcher.stop().await;
    }

    #[tokio::test]
    async fn rewritten_file_triggers_rescan() {
        let dir = tempfile::tempdir().unwrap();
        let gif = dir.path().join("a.gif");
        std::fs::write(&gif, b"GIF89a").unwrap();
        let mut watcher = Running::start(dir.path()).await;

        std::fs::write(&gif, b"GIF89a-but-longer").unwrap();

        watcher.expect_rescan().await;
        watcher.stop().await;
    }

    #[tokio::test]
    async fn renamed_file_triggers_rescan() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.gif"), b"GIF89a").unwrap();
        let mut watcher = Running::start(dir.path()).await;

        std::fs::rename(dir.path().join("a.gif"), dir.path().join("b.gif")).unwrap();

        watcher.expect_rescan().await;
        watcher.stop().await;
    }

    #[tokio::test]
    async fn temp_file_persisted_over_media_triggers_rescan() {
        let dir = tempfile::tempdir().unwrap();
        let gif = dir.path().join("a.gif");
        std::fs::write(&gif, b"GIF89a").unwrap();
        let mut watcher = Running::start(dir.path()).await;

        let tmp = tempfile::NamedTempFile::new_in(dir.path()).unwrap();
        std::fs::write(tmp.path(), b"GIF89a-resized").unwrap();
        tmp.persist(&gif).unwrap();

        watcher.expect_rescan().await;
        watcher.stop().await;
    }

    #[tokio::test]
    async fn unrelated_files_do_not_trigger_rescan() {
        let dir = tempfile::tempdir().unwrap();
        let mut watcher = Running::start(dir.path()).await;

        let tmp = dir.path().join(".tmpXyZ123");
        std::fs::write(&tmp, b"partial").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"hello").unwrap();
        std::fs::remove_file(&tmp).unwrap();

        watcher.expect_quiet().await;
        watcher.stop().await;
    }
}
