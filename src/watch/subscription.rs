use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use kube::api::DynamicObject;
use kube::runtime::watcher::{self, Config as WatcherConfig};
use kube::runtime::WatchStreamExt;
use kube::{Api, Client};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

use super::resource::ResourceKind;
use super::WatchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Inactive,
    Active,
    Fallback,
}

/// Tuning knobs for one subscription; defaults match spec.md §4.6.
#[derive(Debug, Clone)]
pub struct SubscriptionConfig {
    pub debounce: Duration,
    pub relist_interval: Duration,
    pub fallback_interval: Duration,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(100),
            relist_interval: Duration::from_secs(10),
            fallback_interval: Duration::from_secs(1),
        }
    }
}

/// A callback fired whenever the subscribed resource listing may have
/// changed - on a debounced watch event, on a relist, or on a fallback
/// poll tick. The fabric doesn't diff for the caller; it just signals
/// "go re-read the listing."
pub type ChangeCallback = Arc<dyn Fn() + Send + Sync>;

/// One (resource kind, namespace) subscription. `start`/`stop` are
/// idempotent and safe to call from any task; `state()` reports the
/// state machine's current position without blocking.
pub struct Subscription {
    client: Client,
    kind: &'static ResourceKind,
    namespace: Option<String>,
    config: SubscriptionConfig,
    on_change: ChangeCallback,
    state: Arc<AsyncMutex<WatchState>>,
    stopped: Arc<AtomicBool>,
    task: AsyncMutex<Option<JoinHandle<()>>>,
}

/// A lightweight handle a view subscriber keeps instead of the
/// [`Subscription`] itself, per spec.md §3's "views hold weak
/// references (identifier + lookup)" ownership note.
#[derive(Clone)]
pub struct SubscriptionHandle {
    pub kind: &'static str,
    pub namespace: Option<String>,
    state: Arc<AsyncMutex<WatchState>>,
}

impl SubscriptionHandle {
    pub async fn state(&self) -> WatchState {
        *self.state.lock().await
    }
}

impl Subscription {
    pub fn new(
        client: Client,
        kind_name: &str,
        namespace: Option<String>,
        config: SubscriptionConfig,
        on_change: ChangeCallback,
    ) -> Result<Self, WatchError> {
        let kind = ResourceKind::lookup(kind_name).ok_or_else(|| WatchError::UnsupportedResource(kind_name.to_string()))?;
        Ok(Self {
            client,
            kind,
            namespace,
            config,
            on_change,
            state: Arc::new(AsyncMutex::new(WatchState::Inactive)),
            stopped: Arc::new(AtomicBool::new(true)),
            task: AsyncMutex::new(None),
        })
    }

    pub fn handle(&self) -> SubscriptionHandle {
        SubscriptionHandle { kind: self.kind.name, namespace: self.namespace.clone(), state: self.state.clone() }
    }

    async fn set_state(&self, new_state: WatchState) {
        *self.state.lock().await = new_state;
    }

    fn api(&self) -> Api<DynamicObject> {
        let resource = self.kind.api_resource();
        match (&self.namespace, self.kind.namespaced) {
            (Some(ns), true) => Api::namespaced_with(self.client.clone(), ns, &resource),
            _ => Api::all_with(self.client.clone(), &resource),
        }
    }

    /// Opens the watch (or falls back to polling if it can't be opened)
    /// and spawns the background task driving the state machine.
    /// Idempotent: calling `start` on an already-running subscription is
    /// a no-op.
    pub async fn start(&self) {
        if !self.stopped.swap(false, Ordering::SeqCst) {
            return;
        }

        let api = self.api();
        let stopped = self.stopped.clone();
        let state = self.state.clone();
        let on_change = self.on_change.clone();
        let config = self.config.clone();

        let handle = tokio::spawn(async move {
            run_watch_loop(api, stopped, state, on_change, config).await;
        });

        *self.task.lock().await = Some(handle);
    }

    /// Moves any state to `Inactive`, idempotently, and cancels the
    /// background task. Safe to call any number of times.
    pub async fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        if let Some(handle) = self.task.lock().await.take() {
            handle.abort();
        }
        self.set_state(WatchState::Inactive).await;
    }

    pub async fn state(&self) -> WatchState {
        *self.state.lock().await
    }
}

async fn run_watch_loop(
    api: Api<DynamicObject>,
    stopped: Arc<AtomicBool>,
    state: Arc<AsyncMutex<WatchState>>,
    on_change: ChangeCallback,
    config: SubscriptionConfig,
) {
    loop {
        if stopped.load(Ordering::SeqCst) {
            return;
        }

        let watcher_config = WatcherConfig::default();
        let mut stream = Box::pin(watcher::watcher(api.clone(), watcher_config).default_backoff());

        *state.lock().await = WatchState::Active;
        let mut debounce = tokio::time::interval(config.debounce.max(Duration::from_millis(1)));
        let mut relist = tokio::time::interval(config.relist_interval);
        let mut pending = false;

        loop {
            if stopped.load(Ordering::SeqCst) {
                return;
            }

            tokio::select! {
                event = stream.next() => {
                    match event {
                        Some(Ok(_)) => { pending = true; }
                        Some(Err(err)) => {
                            tracing::warn!(error = %err, "watch stream lost, falling back to polling");
                            break;
                        }
                        None => {
                            tracing::warn!("watch stream ended, falling back to polling");
                            break;
                        }
                    }
                }
                _ = debounce.tick() => {
                    if pending {
                        pending = false;
                        on_change();
                    }
                }
                _ = relist.tick() => {
                    on_change();
                }
            }
        }

        // Fallback: poll at the fallback interval until the watch can be
        // re-established, or we're told to stop.
        *state.lock().await = WatchState::Fallback;
        let mut backoff = config.fallback_interval;
        let max_backoff = Duration::from_secs(30);

        loop {
            if stopped.load(Ordering::SeqCst) {
                return;
            }
            tokio::time::sleep(backoff).await;
            if stopped.load(Ordering::SeqCst) {
                return;
            }
            on_change();

            // Bounded backoff on re-attempts, reset once a watch holds
            // for at least one full interval (handled by the outer loop
            // re-entering Active above).
            backoff = (backoff * 2).min(max_backoff);
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_match_spec() {
        let config = SubscriptionConfig::default();
        assert_eq!(config.debounce, Duration::from_millis(100));
        assert_eq!(config.relist_interval, Duration::from_secs(10));
        assert_eq!(config.fallback_interval, Duration::from_secs(1));
    }
}
