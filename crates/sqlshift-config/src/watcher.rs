use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::watch;
use tracing::{debug, info};

const DEBOUNCE_MS: u64 = 500;

/// Watches a migrations directory and bumps a counter on a
/// `tokio::sync::watch` channel whenever `.sql` files there are created or
/// modified. Bursts of events within the debounce window count once.
pub struct MigrationsWatcher {
    // Dropping the watcher stops watching.
    _watcher: RecommendedWatcher,
}

impl MigrationsWatcher {
    /// Start watching `dir`. Must be called from within a tokio runtime.
    pub fn start(dir: PathBuf) -> Result<(Self, watch::Receiver<u64>), notify::Error> {
        let (tx, rx) = watch::channel(0u64);
        let (notify_tx, mut notify_rx) = tokio::sync::mpsc::channel::<()>(8);

        let mut watcher =
            notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
                let Ok(event) = event else {
                    return;
                };
                if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                    return;
                }
                if event.paths.iter().any(|p| is_script(p)) {
                    let _ = notify_tx.try_send(());
                }
            })?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tokio::spawn(async move {
            let mut changes = 0u64;
            loop {
                if notify_rx.recv().await.is_none() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(DEBOUNCE_MS)).await;
                while notify_rx.try_recv().is_ok() {}

                changes += 1;
                debug!("migrations changed ({changes})");
                if tx.send(changes).is_err() {
                    break; // no receivers left
                }
            }
        });

        info!("watching migrations in {}", dir.display());
        Ok((Self { _watcher: watcher }, rx))
    }
}

fn is_script(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "sql")
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn only_sql_files_count_as_scripts() {
        assert!(is_script(Path::new("/m/1.init.up.sql")));
        assert!(!is_script(Path::new("/m/readme.txt")));
        assert!(!is_script(Path::new("/m/sql")));
    }

    #[tokio::test]
    async fn new_script_bumps_the_counter() {
        let dir = tempfile::tempdir().unwrap();
        let (_watcher, mut rx) = MigrationsWatcher::start(dir.path().to_path_buf()).unwrap();

        fs::write(dir.path().join("readme.txt"), "ignored").unwrap();
        fs::write(dir.path().join("1.init.up.sql"), "SELECT 1;").unwrap();

        tokio::time::timeout(Duration::from_secs(10), rx.changed())
            .await
            .expect("no change notification")
            .unwrap();
        assert_eq!(*rx.borrow(), 1);
    }
}
