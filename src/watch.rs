use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, channel};

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::config::{TerrainConfig, load_config_from_path};

/// Reloads the config file when it changes on disk.
pub struct ConfigWatch {
    path: PathBuf,
    rx: Receiver<()>,
    _watcher: RecommendedWatcher,
}

impl ConfigWatch {
    pub fn new(path: &Path) -> notify::Result<Self> {
        let (tx, rx) = channel::<()>();
        let mut watcher =
            notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
                if let Ok(event) = res {
                    match event.kind {
                        EventKind::Modify(_)
                        | EventKind::Create(_)
                        | EventKind::Remove(_)
                        | EventKind::Any => {
                            let _ = tx.send(());
                        }
                        _ => {}
                    }
                }
            })?;
        watcher.watch(path, RecursiveMode::NonRecursive)?;
        log::info!(target: "config", "watching {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            rx,
            _watcher: watcher,
        })
    }

    /// Drains pending change notices and returns the freshly loaded config, if any.
    ///
    /// A file that fails to parse is logged and skipped; the caller keeps its current config.
    pub fn poll(&self) -> Option<TerrainConfig> {
        let mut changed = false;
        for _ in self.rx.try_iter() {
            changed = true;
        }
        if !changed {
            return None;
        }
        match load_config_from_path(&self.path) {
            Ok(cfg) => {
                log::info!(target: "config", "reloaded {}", self.path.display());
                Some(cfg)
            }
            Err(e) => {
                log::warn!(target: "config", "ignoring {}: {}", self.path.display(), e);
                None
            }
        }
    }
}
