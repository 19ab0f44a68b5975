//! Learner Workspaces
//!
//! A workspace is the server-side counterpart of the tutor screen: one view
//! per feature plus an optional conversation. Each workspace owns a
//! cancellation token that every outstanding request is bound to, so closing
//! the workspace abandons its in-flight model calls.
//!
//! Browsers rarely say goodbye, so the registry also evicts workspaces that
//! have not been touched for a while and caps how many can be open at once.

use lingo_core::{
    conversation::Conversation,
    error::TutorError,
    models::{ChatMessage, Feature, GrammarCorrection, Story},
    tutor::WordLookup,
    view::{FeatureView, Submission},
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_MAX_WORKSPACES: usize = 1000;

/// The current conversation of a workspace and the token its turns run under.
///
/// The token is cancelled when the conversation is replaced or the workspace
/// closes, whichever comes first.
#[derive(Clone)]
pub struct ActiveConversation {
    conversation: Arc<Conversation>,
    cancel: CancellationToken,
}

impl ActiveConversation {
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Sends one turn. An abandoned turn appends no reply.
    pub async fn send(&self, text: &str) -> Result<Submission<ChatMessage>, TutorError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(TutorError::Cancelled),
            outcome = self.conversation.send(text) => outcome,
        }
    }
}

pub struct Workspace {
    pub id: Uuid,
    cancel: CancellationToken,
    last_access: Mutex<Instant>,
    pub vocabulary: Arc<FeatureView<WordLookup>>,
    pub grammar: Arc<FeatureView<GrammarCorrection>>,
    pub story: Arc<FeatureView<Story>>,
    conversation: RwLock<Option<ActiveConversation>>,
}

impl Workspace {
    pub fn new(id: Uuid) -> Self {
        let cancel = CancellationToken::new();
        Self {
            id,
            last_access: Mutex::new(Instant::now()),
            vocabulary: Arc::new(FeatureView::new(Feature::Vocabulary, cancel.child_token())),
            grammar: Arc::new(FeatureView::new(Feature::Grammar, cancel.child_token())),
            story: Arc::new(FeatureView::new(Feature::Story, cancel.child_token())),
            conversation: RwLock::new(None),
            cancel,
        }
    }

    pub fn conversation(&self) -> Option<ActiveConversation> {
        self.conversation
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the current conversation.
    ///
    /// A turn still running on the previous conversation is abandoned, and
    /// its session handle is dropped once that turn unwinds.
    pub fn set_conversation(&self, conversation: Conversation) -> ActiveConversation {
        let active = ActiveConversation {
            conversation: Arc::new(conversation),
            cancel: self.cancel.child_token(),
        };
        let previous = self
            .conversation
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(active.clone());
        if let Some(previous) = previous {
            previous.cancel.cancel();
            debug!(workspace_id = %self.id, "Previous conversation abandoned");
        }
        active
    }

    /// True while any feature has a request outstanding.
    pub fn is_busy(&self) -> bool {
        self.vocabulary.is_busy()
            || self.grammar.is_busy()
            || self.story.is_busy()
            || self
                .conversation()
                .is_some_and(|active| active.conversation.is_busy())
    }

    pub fn touch(&self) {
        *self.last_access() = Instant::now();
    }

    pub fn idle_time(&self) -> Duration {
        self.last_access().elapsed()
    }

    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn last_access(&self) -> MutexGuard<'_, Instant> {
        self.last_access.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// All open workspaces, keyed by id.
#[derive(Clone)]
pub struct Workspaces {
    inner: Arc<RwLock<HashMap<Uuid, Arc<Workspace>>>>,
    capacity: usize,
}

impl Default for Workspaces {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_WORKSPACES)
    }
}

impl Workspaces {
    /// A registry holding at most `capacity` workspaces.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::default(),
            capacity: capacity.max(1),
        }
    }

    /// Opens a workspace. At capacity, the least recently used one is closed first.
    pub fn create(&self) -> Arc<Workspace> {
        let workspace = Arc::new(Workspace::new(Uuid::new_v4()));
        let evicted = {
            let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
            let evicted = if inner.len() >= self.capacity {
                let oldest = inner
                    .values()
                    .max_by_key(|candidate| candidate.idle_time())
                    .map(|candidate| candidate.id);
                oldest.and_then(|id| inner.remove(&id))
            } else {
                None
            };
            inner.insert(workspace.id, workspace.clone());
            evicted
        };
        if let Some(evicted) = evicted {
            evicted.close();
            info!(
                workspace_id = %evicted.id,
                capacity = self.capacity,
                "Workspace evicted to make room"
            );
        }
        info!(workspace_id = %workspace.id, "Workspace created");
        workspace
    }

    /// Looks up a workspace and marks it as recently used.
    pub fn get(&self, id: Uuid) -> Option<Arc<Workspace>> {
        let workspace = self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()?;
        workspace.touch();
        Some(workspace)
    }

    /// Removes and closes a workspace. Returns false if it did not exist.
    pub fn remove(&self, id: Uuid) -> bool {
        let removed = self
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        match removed {
            Some(workspace) => {
                workspace.close();
                info!(workspace_id = %id, "Workspace closed");
                true
            }
            None => false,
        }
    }

    /// Closes every workspace untouched for at least `max_idle` that has no
    /// request outstanding. Returns how many were closed.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let expired: Vec<Arc<Workspace>> = {
            let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
            let ids: Vec<Uuid> = inner
                .values()
                .filter(|workspace| workspace.idle_time() >= max_idle && !workspace.is_busy())
                .map(|workspace| workspace.id)
                .collect();
            ids.iter().filter_map(|id| inner.remove(id)).collect()
        };
        for workspace in &expired {
            workspace.close();
            info!(
                workspace_id = %workspace.id,
                idle_secs = workspace.idle_time().as_secs(),
                "Idle workspace evicted"
            );
        }
        expired.len()
    }

    /// Periodically evicts workspaces idle for `idle_timeout` until `shutdown` fires.
    pub fn spawn_reaper(
        &self,
        idle_timeout: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let workspaces = self.clone();
        let period = (idle_timeout / 4).max(Duration::from_millis(100));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let evicted = workspaces.evict_idle(idle_timeout);
                        if evicted > 0 {
                            debug!(evicted, open = workspaces.len(), "Workspace sweep finished");
                        }
                    }
                }
            }
        })
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
