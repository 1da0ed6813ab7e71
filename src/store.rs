use crate::types::push::{Notification, NotificationStatus, Subscription};
use crate::types::timer::FocusSession;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use time::OffsetDateTime;

const REMINDERS_FILE: &str = "reminders.toml";
const SESSIONS_FILE: &str = "sessions.toml";
const TIMERS_DIR: &str = "timers";

/// A claimed notification becomes re-claimable after this long, so a
/// dispatch run that died mid-flight cannot strand rows in `processing`.
pub(crate) const CLAIM_LEASE: time::Duration = time::Duration::minutes(5);

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Encode(toml::ser::Error),
    Snapshot(serde_json::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io(err) => write!(f, "store io error: {err}"),
            StoreError::Parse(err) => write!(f, "store parse error: {err}"),
            StoreError::Encode(err) => write!(f, "store encode error: {err}"),
            StoreError::Snapshot(err) => write!(f, "timer snapshot error: {err}"),
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err)
    }
}

/// Everything the reminders file holds. Also the debug-endpoint response
/// shape, which is why it serializes wholesale.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub next_id: u64,
    #[serde(default)]
    pub notifications: Vec<Notification>,
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SessionLog {
    #[serde(default)]
    sessions: Vec<FocusSession>,
}

/// File-backed repositories for notifications, subscriptions, timer
/// snapshots, and the focus-session log. Mutations rewrite the backing file
/// under the in-memory lock, which is the crate's only serialization point.
pub struct Store {
    dir: PathBuf,
    registry: Mutex<Registry>,
    sessions: Mutex<SessionLog>,
}

impl Store {
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(dir)?;
        let registry = read_toml_or_default(&dir.join(REMINDERS_FILE))?;
        let sessions = read_toml_or_default(&dir.join(SESSIONS_FILE))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            registry: Mutex::new(registry),
            sessions: Mutex::new(sessions),
        })
    }

    fn persist_registry(&self, registry: &Registry) -> Result<(), StoreError> {
        let contents = toml::to_string(registry).map_err(StoreError::Encode)?;
        std::fs::write(self.dir.join(REMINDERS_FILE), contents)?;
        Ok(())
    }

    pub fn registry_snapshot(&self) -> Registry {
        self.registry.lock().expect("registry lock").clone()
    }

    pub fn schedule_notification(
        &self,
        user: &str,
        fire_at: OffsetDateTime,
        title: &str,
        body: &str,
    ) -> Result<Notification, StoreError> {
        let mut registry = self.registry.lock().expect("registry lock");
        registry.next_id += 1;
        let notification = Notification {
            id: registry.next_id,
            user: user.to_string(),
            fire_at,
            title: title.to_string(),
            body: body.to_string(),
            status: NotificationStatus::Pending,
            sent_at: None,
            claimed_at: None,
        };
        registry.notifications.push(notification.clone());
        self.persist_registry(&registry)?;
        Ok(notification)
    }

    /// Claims up to `limit` due notifications by flipping them to
    /// `processing` before anything is sent. A row already claimed by a
    /// live run is invisible here; a row whose claim lease has lapsed is
    /// treated as abandoned and re-claimed.
    pub fn claim_due(
        &self,
        now: OffsetDateTime,
        limit: usize,
    ) -> Result<Vec<Notification>, StoreError> {
        let mut registry = self.registry.lock().expect("registry lock");
        let mut claimed = Vec::new();
        for notification in registry.notifications.iter_mut() {
            if claimed.len() >= limit {
                break;
            }
            if notification.fire_at > now {
                continue;
            }
            let claimable = match notification.status {
                NotificationStatus::Pending => true,
                NotificationStatus::Processing => notification
                    .claimed_at
                    .is_none_or(|claimed_at| now - claimed_at > CLAIM_LEASE),
                NotificationStatus::Sent | NotificationStatus::Failed => false,
            };
            if !claimable {
                continue;
            }
            notification.status = NotificationStatus::Processing;
            notification.claimed_at = Some(now);
            claimed.push(notification.clone());
        }
        if !claimed.is_empty() {
            self.persist_registry(&registry)?;
        }
        Ok(claimed)
    }

    fn update_notification(
        &self,
        id: u64,
        apply: impl FnOnce(&mut Notification),
    ) -> Result<(), StoreError> {
        let mut registry = self.registry.lock().expect("registry lock");
        let Some(notification) = registry.notifications.iter_mut().find(|n| n.id == id) else {
            return Ok(());
        };
        apply(notification);
        self.persist_registry(&registry)
    }

    /// Hands a claimed notification back for a later run.
    pub fn release_notification(&self, id: u64) -> Result<(), StoreError> {
        self.update_notification(id, |notification| {
            notification.status = NotificationStatus::Pending;
            notification.claimed_at = None;
        })
    }

    pub fn mark_sent(&self, id: u64, at: OffsetDateTime) -> Result<(), StoreError> {
        self.update_notification(id, |notification| {
            notification.status = NotificationStatus::Sent;
            notification.sent_at = Some(at);
            notification.claimed_at = None;
        })
    }

    pub fn mark_failed(&self, id: u64) -> Result<(), StoreError> {
        self.update_notification(id, |notification| {
            notification.status = NotificationStatus::Failed;
            notification.claimed_at = None;
        })
    }

    pub fn subscriptions_for(&self, user: &str) -> Vec<Subscription> {
        let registry = self.registry.lock().expect("registry lock");
        registry
            .subscriptions
            .iter()
            .filter(|subscription| subscription.user == user)
            .cloned()
            .collect()
    }

    /// Upsert keyed on endpoint: a browser re-registering replaces its row
    /// even if the keys or the owning user changed.
    pub fn upsert_subscription(&self, subscription: Subscription) -> Result<(), StoreError> {
        let mut registry = self.registry.lock().expect("registry lock");
        match registry
            .subscriptions
            .iter_mut()
            .find(|existing| existing.endpoint == subscription.endpoint)
        {
            Some(existing) => *existing = subscription,
            None => registry.subscriptions.push(subscription),
        }
        self.persist_registry(&registry)
    }

    pub fn delete_subscription(&self, endpoint: &str) -> Result<bool, StoreError> {
        let mut registry = self.registry.lock().expect("registry lock");
        let before = registry.subscriptions.len();
        registry
            .subscriptions
            .retain(|subscription| subscription.endpoint != endpoint);
        if registry.subscriptions.len() == before {
            return Ok(false);
        }
        self.persist_registry(&registry)?;
        Ok(true)
    }

    fn timer_path(&self, user: &str) -> PathBuf {
        self.dir
            .join(TIMERS_DIR)
            .join(format!("{}.json", sanitize_file_stem(user)))
    }

    pub fn load_timer_snapshot(&self, user: &str) -> Result<Option<String>, StoreError> {
        match std::fs::read_to_string(self.timer_path(user)) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub fn save_timer_snapshot(&self, user: &str, snapshot: &str) -> Result<(), StoreError> {
        std::fs::create_dir_all(self.dir.join(TIMERS_DIR))?;
        std::fs::write(self.timer_path(user), snapshot)?;
        Ok(())
    }

    pub fn append_focus_session(&self, session: FocusSession) -> Result<(), StoreError> {
        let mut log = self.sessions.lock().expect("sessions lock");
        log.sessions.push(session);
        let contents = toml::to_string(&*log).map_err(StoreError::Encode)?;
        std::fs::write(self.dir.join(SESSIONS_FILE), contents)?;
        Ok(())
    }

    #[cfg(test)]
    fn focus_sessions(&self) -> Vec<FocusSession> {
        self.sessions.lock().expect("sessions lock").sessions.clone()
    }
}

fn read_toml_or_default<T: serde::de::DeserializeOwned + Default>(
    path: &Path,
) -> Result<T, StoreError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => toml::from_str(&contents).map_err(StoreError::Parse),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(err) => Err(err.into()),
    }
}

/// Timer snapshots are one file per user; user ids come from tokens, so
/// anything that could escape the timers directory is flattened.
fn sanitize_file_stem(user: &str) -> String {
    let stem: String = user
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() { "_".to_string() } else { stem }
}
