//! Persisted mapping of logical actions to shortcut descriptors.
//!
//! The store is a single JSON document under the per-user Application
//! Support directory, rewritten whole on every change (temp file + rename,
//! so a crash mid-write never leaves a torn file). The in-memory map is
//! authoritative; a failed write is logged and retried naturally by the
//! next `set`.

use std::{
    collections::HashMap,
    fmt, fs, io,
    path::{Path, PathBuf},
};

use mac_hotkey::KeyCombo;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Capacity of the store-changed broadcast channel.
const EVENT_CAPACITY: usize = 16;

/// Logical action a shortcut can trigger. The string form is the stable
/// persistence key; renaming a variant is a data migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShortcutId {
    /// Activate the reply control of the current notification.
    Reply,
    /// Open the notification's owning application.
    Open,
    /// Close all displayed notifications.
    Dismiss,
    /// Show the notification's options disclosure.
    Options,
}

impl ShortcutId {
    /// All identifiers, in display order.
    pub const ALL: [Self; 4] = [Self::Reply, Self::Open, Self::Dismiss, Self::Options];

    /// Stable string form, used as the persistence key and tracing field.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reply => "reply",
            Self::Open => "open",
            Self::Dismiss => "dismiss",
            Self::Options => "options",
        }
    }
}

impl fmt::Display for ShortcutId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user-chosen shortcut: the combo plus an optional display string
/// captured by the shortcut recorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortcutSpec {
    /// Key code + modifier mask.
    pub combo: KeyCombo,
    /// Human-readable rendering recorded at capture time, for menu display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub characters: Option<String>,
}

/// Persisted shortcut store with change notifications.
pub struct ShortcutStore {
    /// Location of the JSON document.
    path: PathBuf,
    /// In-memory descriptors; absent key = unbound.
    entries: Mutex<HashMap<ShortcutId, ShortcutSpec>>,
    /// Change events, carrying the identifier that changed.
    tx: broadcast::Sender<ShortcutId>,
}

impl ShortcutStore {
    /// Default per-user location of the shortcuts file.
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or(Error::NoHome)?;
        Ok(home.join("Library/Application Support/NotiKeys/shortcuts.json"))
    }

    /// Load the store from `path`.
    ///
    /// On first run, or when a previously written file lacks an identifier
    /// (an action added after the file was created), the missing entries
    /// are filled with unbound placeholders and the file is rewritten —
    /// once, here, never on reads.
    pub fn load(path: PathBuf) -> Result<Self> {
        let mut entries = HashMap::new();
        let mut needs_rewrite = false;

        match fs::read(&path) {
            Ok(bytes) => {
                match serde_json::from_slice::<HashMap<String, Option<ShortcutSpec>>>(&bytes) {
                    Ok(raw) => {
                        for id in ShortcutId::ALL {
                            match raw.get(id.as_str()) {
                                Some(Some(spec)) => {
                                    entries.insert(id, spec.clone());
                                }
                                Some(None) => {}
                                None => {
                                    debug!(id = %id, "filling_missing_identifier");
                                    needs_rewrite = true;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        // Unreadable file: fall back to all-unbound rather
                        // than refusing to start.
                        warn!(error = %e, path = %path.display(), "shortcuts_file_unreadable_resetting");
                        needs_rewrite = true;
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                needs_rewrite = true;
            }
            Err(e) => return Err(Error::Io(e)),
        }

        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        let store = Self {
            path,
            entries: Mutex::new(entries),
            tx,
        };
        if needs_rewrite
            && let Err(e) = store.persist()
        {
            warn!(error = %e, "store_write_failed");
        }
        Ok(store)
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current descriptor for `id`, if bound.
    pub fn get(&self, id: ShortcutId) -> Option<ShortcutSpec> {
        self.entries.lock().get(&id).cloned()
    }

    /// Replace the descriptor for `id` (`None` unbinds).
    ///
    /// Persists before notifying: listeners are allowed to re-read the
    /// store the moment they see the event.
    pub fn set(&self, id: ShortcutId, spec: Option<ShortcutSpec>) -> Result<()> {
        {
            let mut entries = self.entries.lock();
            match spec {
                Some(s) => {
                    entries.insert(id, s);
                }
                None => {
                    entries.remove(&id);
                }
            }
        }
        let persisted = self.persist();
        if let Err(ref e) = persisted {
            // In-memory state stays authoritative; the next set retries.
            warn!(error = %e, id = %id, "store_write_failed");
        }
        let _ = self.tx.send(id);
        persisted
    }

    /// Subscribe to change events.
    pub fn subscribe(&self) -> broadcast::Receiver<ShortcutId> {
        self.tx.subscribe()
    }

    /// Atomically overwrite the whole file.
    fn persist(&self) -> Result<()> {
        let doc: HashMap<&'static str, Option<ShortcutSpec>> = {
            let entries = self.entries.lock();
            ShortcutId::ALL
                .iter()
                .map(|id| (id.as_str(), entries.get(id).cloned()))
                .collect()
        };
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&doc)?)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), "shortcuts_persisted");
        Ok(())
    }
}
