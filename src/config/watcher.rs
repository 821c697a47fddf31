//! Configuration file watcher for hot reload.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// Notification delivered to the watch loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// The config file was written or replaced.
    Changed,
    /// The file-event subsystem reported an error.
    Error(String),
}

/// A watcher that monitors the configuration file for changes.
///
/// The parent directory is watched rather than the file itself so that
/// editors which save by renaming a temp file over the original are seen.
pub struct ConfigWatcher {
    path: PathBuf,
    event_tx: mpsc::UnboundedSender<WatchEvent>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for change notifications.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<WatchEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        (Self {
            path: path.to_path_buf(),
            event_tx,
        }, event_rx)
    }

    /// Start watching. The returned handle must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.event_tx;
        let file_name = self.path.file_name().map(|n| n.to_os_string());
        let dir = watch_dir(&self.path);

        let mut watcher = RecommendedWatcher::new(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    if let Some(ev) = classify(&event, file_name.as_ref()) {
                        tracing::debug!(kind = ?event.kind, "Config file event");
                        let _ = tx.send(ev);
                    }
                }
                Err(e) => {
                    let _ = tx.send(WatchEvent::Error(e.to_string()));
                }
            }
        }, Config::default().with_poll_interval(Duration::from_secs(2)))?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, dir = ?dir, "Config watcher started");
        Ok(watcher)
    }
}

fn watch_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Map a raw notify event to a watch-loop event, if it concerns the config file.
fn classify(event: &Event, file_name: Option<&OsString>) -> Option<WatchEvent> {
    if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
        return None;
    }
    let file_name = file_name?;
    event
        .paths
        .iter()
        .any(|p| p.file_name() == Some(file_name.as_os_str()))
        .then_some(WatchEvent::Changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, ModifyKind, RemoveKind};

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn test_write_to_config_is_change() {
        let name = OsString::from("config.yml");
        let ev = event(EventKind::Modify(ModifyKind::Data(DataChange::Content)), "/etc/krouter/config.yml");
        assert_eq!(classify(&ev, Some(&name)), Some(WatchEvent::Changed));

        let ev = event(EventKind::Create(CreateKind::File), "/etc/krouter/config.yml");
        assert_eq!(classify(&ev, Some(&name)), Some(WatchEvent::Changed));
    }

    #[test]
    fn test_other_files_and_kinds_ignored() {
        let name = OsString::from("config.yml");
        let ev = event(EventKind::Modify(ModifyKind::Data(DataChange::Content)), "/etc/krouter/other.yml");
        assert_eq!(classify(&ev, Some(&name)), None);

        let ev = event(EventKind::Remove(RemoveKind::File), "/etc/krouter/config.yml");
        assert_eq!(classify(&ev, Some(&name)), None);

        let ev = event(EventKind::Access(AccessKind::Any), "/etc/krouter/config.yml");
        assert_eq!(classify(&ev, Some(&name)), None);
    }

    #[test]
    fn test_watch_dir() {
        assert_eq!(watch_dir(Path::new("/etc/krouter/config.yml")), PathBuf::from("/etc/krouter"));
        assert_eq!(watch_dir(Path::new("config.yml")), PathBuf::from("."));
    }
}
