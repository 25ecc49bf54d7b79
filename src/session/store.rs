use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex as SyncMutex;
use tokio::sync::{oneshot, Mutex as AsyncMutex};

use super::message::{Message, ToolExecutionRecord};
use super::SessionError;

struct SessionInner {
    messages: Vec<Message>,
    tool_executions: Vec<ToolExecutionRecord>,
    busy: bool,
    /// FIFO of turns waiting for the session to go idle. A message is
    /// appended to `messages` at submission time (so the transcript
    /// reflects arrival order even while queued); the sender fires once
    /// the previous turn finishes, handing the session to the next
    /// waiter without ever dropping `busy` back to false in between.
    waiters: VecDeque<oneshot::Sender<()>>,
}

impl SessionInner {
    fn new() -> Self {
        Self { messages: Vec::new(), tool_executions: Vec::new(), busy: false, waiters: VecDeque::new() }
    }
}

/// A single session's serialized transcript and in-flight-turn queue.
/// Cheaply cloneable; clones share the same underlying state.
#[derive(Clone)]
pub struct SessionHandle {
    id: String,
    inner: Arc<AsyncMutex<SessionInner>>,
}

/// Held by whichever caller is currently allowed to drive the agent
/// loop for this session. Dropping it (or calling [`Self::finish`])
/// wakes the next queued turn, if any.
pub struct TurnLease<'a> {
    handle: &'a SessionHandle,
    finished: bool,
}

impl<'a> TurnLease<'a> {
    pub async fn finish(mut self) {
        self.finish_inner().await;
    }

    async fn finish_inner(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        let mut inner = self.handle.inner.lock().await;
        match inner.waiters.pop_front() {
            Some(tx) => {
                let _ = tx.send(());
            }
            None => inner.busy = false,
        }
    }
}

impl<'a> Drop for TurnLease<'a> {
    fn drop(&mut self) {
        if !self.finished {
            // Best-effort: a lease dropped without `finish()` (e.g. a
            // panicking turn) still needs to release the session so it
            // doesn't wedge forever. Spawn the async unlock.
            let handle = self.handle.clone();
            tokio::spawn(async move {
                let mut inner = handle.inner.lock().await;
                match inner.waiters.pop_front() {
                    Some(tx) => { let _ = tx.send(()); }
                    None => inner.busy = false,
                }
            });
        }
    }
}

impl SessionHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Appends `message` to the transcript and returns a lease once it's
    /// this message's turn to be processed. If the session is idle the
    /// lease is granted immediately; if another turn is in flight, the
    /// message is recorded now but the lease waits for every
    /// earlier-queued turn to finish first.
    pub async fn submit(&self, message: Message) -> TurnLease<'_> {
        let mut inner = self.inner.lock().await;
        inner.messages.push(message);

        if !inner.busy {
            inner.busy = true;
            return TurnLease { handle: self, finished: false };
        }

        let (tx, rx) = oneshot::channel();
        inner.waiters.push_back(tx);
        drop(inner);
        let _ = rx.await;
        TurnLease { handle: self, finished: false }
    }

    pub async fn append_message(&self, message: Message) {
        self.inner.lock().await.messages.push(message);
    }

    pub async fn append_tool_execution(&self, record: ToolExecutionRecord) {
        self.inner.lock().await.tool_executions.push(record);
    }

    pub async fn update_tool_execution<F: FnOnce(&mut ToolExecutionRecord)>(&self, call_id: &str, f: F) {
        let mut inner = self.inner.lock().await;
        if let Some(record) = inner.tool_executions.iter_mut().rev().find(|r| r.call.id == call_id) {
            f(record);
        }
    }

    pub async fn messages(&self) -> Vec<Message> {
        self.inner.lock().await.messages.clone()
    }

    pub async fn tool_executions(&self) -> Vec<ToolExecutionRecord> {
        self.inner.lock().await.tool_executions.clone()
    }

    pub async fn pending_turn_count(&self) -> usize {
        self.inner.lock().await.waiters.len()
    }
}

/// Registry of every known [`SessionHandle`], keyed by session id.
pub struct SessionStore {
    sessions: SyncMutex<HashMap<String, SessionHandle>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self { sessions: SyncMutex::new(HashMap::new()) }
    }

    pub fn get_or_create(&self, session_id: &str) -> SessionHandle {
        let mut sessions = self.sessions.lock();
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionHandle {
                id: session_id.to_string(),
                inner: Arc::new(AsyncMutex::new(SessionInner::new())),
            })
            .clone()
    }

    pub fn get(&self, session_id: &str) -> Result<SessionHandle, SessionError> {
        self.sessions
            .lock()
            .get(session_id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }

    pub fn remove(&self, session_id: &str) {
        self.sessions.lock().remove(session_id);
    }

    pub fn session_ids(&self) -> Vec<String> {
        self.sessions.lock().keys().cloned().collect()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::message::Message;

    #[tokio::test]
    async fn second_submit_queues_until_first_finishes() {
        let store = SessionStore::new();
        let handle = store.get_or_create("s1");

        let lease1 = handle.submit(Message::user("first", chrono::Utc::now())).await;
        assert_eq!(handle.pending_turn_count().await, 0);

        let handle2 = handle.clone();
        let second = tokio::spawn(async move {
            let lease2 = handle2.submit(Message::user("second", chrono::Utc::now())).await;
            lease2.finish().await;
        });

        // give the spawned task a chance to enqueue
        tokio::task::yield_now().await;
        assert_eq!(handle.pending_turn_count().await, 1);

        lease1.finish().await;
        second.await.unwrap();

        assert_eq!(handle.messages().await.len(), 2);
        assert_eq!(handle.pending_turn_count().await, 0);
    }

    #[tokio::test]
    async fn store_reuses_handle_for_same_session_id() {
        let store = SessionStore::new();
        let a = store.get_or_create("s1");
        a.append_message(Message::user("hi", chrono::Utc::now())).await;
        let b = store.get_or_create("s1");
        assert_eq!(b.messages().await.len(), 1);
    }

    #[test]
    fn unknown_session_errors() {
        let store = SessionStore::new();
        assert!(matches!(store.get("nope"), Err(SessionError::NotFound(_))));
    }
}
