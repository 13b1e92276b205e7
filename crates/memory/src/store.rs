//! The per-session conversation store.
//!
//! Appends hit the in-process cache synchronously; replication to the
//! durable backend and compaction both run on spawned tasks so the caller
//! is never blocked. The cache is the source of truth for prompt assembly
//! (`read_cached` does no I/O, ever).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use riptide_core::backend::DurableBackend;
use riptide_core::message::{CompactedMemory, Message, SessionId};
use riptide_core::summarizer::Summarizer;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::config::CompactionConfig;
use crate::token::estimate_messages_tokens;

/// Summarization bound when no prior summary is being folded in.
const SUMMARY_WORD_LIMIT: usize = 300;

/// Summarization bound when merging a prior summary with new material.
const MERGED_SUMMARY_WORD_LIMIT: usize = 400;

/// Keyed conversation memory: one ordered message log per session, plus the
/// compaction records accumulated over the session's lifetime.
pub struct ConversationStore {
    sessions: RwLock<HashMap<SessionId, Vec<Message>>>,
    compacted: RwLock<HashMap<SessionId, Vec<CompactedMemory>>>,
    backend: Arc<dyn DurableBackend>,
    summarizer: Arc<dyn Summarizer>,
    config: CompactionConfig,
    /// Sessions with a compaction pass in flight (single-flight guard).
    compacting: Mutex<HashSet<SessionId>>,
}

impl ConversationStore {
    pub fn new(backend: Arc<dyn DurableBackend>, summarizer: Arc<dyn Summarizer>) -> Self {
        Self::with_config(backend, summarizer, CompactionConfig::default())
    }

    pub fn with_config(
        backend: Arc<dyn DurableBackend>,
        summarizer: Arc<dyn Summarizer>,
        config: CompactionConfig,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            compacted: RwLock::new(HashMap::new()),
            backend,
            summarizer,
            config,
            compacting: Mutex::new(HashSet::new()),
        }
    }

    /// Append a message to the session log.
    ///
    /// The cache is updated before this returns. Replication to the durable
    /// backend is best-effort on a spawned task; a failure there is logged
    /// and never surfaces to the caller. Afterwards the compaction trigger
    /// is evaluated, and compaction (if due) also runs detached.
    pub async fn append(self: &Arc<Self>, session: &SessionId, message: Message) {
        {
            let mut sessions = self.sessions.write().await;
            sessions
                .entry(session.clone())
                .or_default()
                .push(message.clone());
        }

        // Best-effort replication.
        let backend = Arc::clone(&self.backend);
        let sid = session.clone();
        tokio::spawn(async move {
            if let Err(e) = backend.save_message(&sid, &message).await {
                warn!(session = %sid, error = %e, "Message replication failed");
            }
        });

        self.maybe_compact(session).await;
    }

    /// Zero-latency read of the in-process cache only.
    pub async fn read_cached(&self, session: &SessionId) -> Vec<Message> {
        self.sessions
            .read()
            .await
            .get(session)
            .cloned()
            .unwrap_or_default()
    }

    /// Cache read with a durable-backend fallback on miss.
    ///
    /// A fetched log populates the cache so subsequent reads are free.
    pub async fn read_or_fetch(&self, session: &SessionId) -> Vec<Message> {
        if let Some(messages) = self.sessions.read().await.get(session) {
            return messages.clone();
        }

        match self.backend.get_messages(session).await {
            Ok(messages) => {
                // A concurrent append may have created the entry since the
                // read check; the cache wins so the caller sees the same
                // log that later reads will.
                let mut sessions = self.sessions.write().await;
                sessions
                    .entry(session.clone())
                    .or_insert(messages)
                    .clone()
            }
            Err(e) => {
                warn!(session = %session, error = %e, "Backend fetch failed");
                Vec::new()
            }
        }
    }

    /// Replace the cached log wholesale (loading a saved session).
    pub async fn replace(&self, session: &SessionId, messages: Vec<Message>) {
        self.sessions
            .write()
            .await
            .insert(session.clone(), messages);
    }

    /// Drop the cached log and compaction records for a session.
    pub async fn clear(&self, session: &SessionId) {
        self.sessions.write().await.remove(session);
        self.compacted.write().await.remove(session);
    }

    /// Compaction records accumulated for a session, oldest first.
    pub async fn compacted(&self, session: &SessionId) -> Vec<CompactedMemory> {
        self.compacted
            .read()
            .await
            .get(session)
            .cloned()
            .unwrap_or_default()
    }

    /// Evaluate the compaction trigger and spawn a pass if due.
    ///
    /// Trigger: count > hard ceiling, or count > threshold with the token
    /// estimate over budget. At most one pass per session is in flight.
    async fn maybe_compact(self: &Arc<Self>, session: &SessionId) {
        let due = {
            let sessions = self.sessions.read().await;
            let Some(messages) = sessions.get(session) else {
                return;
            };
            let count = messages.len();
            count > self.config.hard_ceiling
                || (count > self.config.threshold
                    && estimate_messages_tokens(messages) > self.config.token_budget)
        };
        if !due {
            return;
        }

        {
            let mut compacting = self.compacting.lock().await;
            if !compacting.insert(session.clone()) {
                return; // already in flight
            }
        }

        let store = Arc::clone(self);
        let sid = session.clone();
        tokio::spawn(async move {
            // The pass runs on its own task so the in-flight entry clears
            // even if it panics; a stuck entry would block compaction for
            // the session forever.
            let pass = tokio::spawn({
                let store = Arc::clone(&store);
                let sid = sid.clone();
                async move { store.compact(&sid).await }
            });
            if pass.await.is_err() {
                warn!(session = %sid, "Compaction pass panicked");
            }
            store.compacting.lock().await.remove(&sid);
        });
    }

    /// Run one compaction pass: summarize everything but the most recent
    /// `keep_recent` messages and replace the cache with
    /// `[summary, ...recent]`. On any failure the log is left uncompacted
    /// for retry on the next append.
    async fn compact(&self, session: &SessionId) {
        let snapshot = self.read_cached(session).await;
        if snapshot.len() <= self.config.keep_recent {
            return;
        }
        let split = snapshot.len() - self.config.keep_recent;
        let older = &snapshot[..split];

        let has_prior_summary = older.iter().any(Message::is_summary);
        let instructions = if has_prior_summary {
            format!(
                "A prior conversation summary is included below. Merge its \
                 content with the newer messages into a single summary — do \
                 not discard it. Keep the result under {MERGED_SUMMARY_WORD_LIMIT} words."
            )
        } else {
            format!(
                "Summarize the conversation so far, preserving decisions, \
                 stated preferences, and open tasks. Keep the result under \
                 {SUMMARY_WORD_LIMIT} words."
            )
        };

        let summary = match self.summarizer.summarize(older, &instructions).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(session = %session, error = %e, "Compaction summarization failed");
                return;
            }
        };

        // Appends only ever land after the summarized prefix, but `replace`
        // or `clear` may have rewritten the log while the summarizer ran.
        // Splice only if the prefix is still exactly what was summarized;
        // otherwise discard the pass (the trigger re-fires on a later
        // append if compaction is still due).
        {
            let mut sessions = self.sessions.write().await;
            let Some(log) = sessions.get_mut(session) else {
                return;
            };
            let prefix_intact = log.len() >= split
                && log
                    .iter()
                    .take(split)
                    .zip(older)
                    .all(|(current, summarized)| current.id == summarized.id);
            if !prefix_intact {
                warn!(
                    session = %session,
                    "Log rewritten during summarization, discarding pass"
                );
                return;
            }
            let kept = log.split_off(split);
            let mut replacement = Vec::with_capacity(kept.len() + 1);
            replacement.push(Message::summary(summary.clone()));
            replacement.extend(kept);
            *log = replacement;
        }

        let record = {
            let mut compacted = self.compacted.write().await;
            let records = compacted.entry(session.clone()).or_default();
            let from_index = records.last().map(|r| r.to_index + 1).unwrap_or(0);
            let record = CompactedMemory {
                summary,
                message_count: split,
                from_index,
                to_index: from_index + split - 1,
            };
            records.push(record.clone());
            record
        };

        debug!(
            session = %session,
            compacted = record.message_count,
            "Compacted conversation prefix"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use riptide_core::backend::TraceRecord;
    use riptide_core::error::{BackendError, MemoryError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Backend that records messages and counts saves.
    #[derive(Default)]
    struct RecordingBackend {
        saves: AtomicUsize,
        stored: Mutex<Vec<Message>>,
    }

    #[async_trait]
    impl DurableBackend for RecordingBackend {
        async fn save_message(
            &self,
            _session: &SessionId,
            message: &Message,
        ) -> Result<(), BackendError> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            self.stored.lock().await.push(message.clone());
            Ok(())
        }

        async fn get_messages(&self, _session: &SessionId) -> Result<Vec<Message>, BackendError> {
            Ok(self.stored.lock().await.clone())
        }

        async fn save_trace(&self, _trace: TraceRecord) -> Result<(), BackendError> {
            Ok(())
        }

        async fn search_knowledge(&self, _query: &str) -> Result<serde_json::Value, BackendError> {
            Ok(serde_json::Value::Null)
        }

        async fn search_products(&self, _query: &str) -> Result<serde_json::Value, BackendError> {
            Ok(serde_json::Value::Null)
        }

        async fn generate_page(
            &self,
            _params: serde_json::Value,
        ) -> Result<serde_json::Value, BackendError> {
            Ok(serde_json::Value::Null)
        }
    }

    /// Backend that appends to the store mid-fetch, racing `read_or_fetch`.
    #[derive(Default)]
    struct SneakyBackend {
        store: Mutex<Option<Arc<ConversationStore>>>,
    }

    #[async_trait]
    impl DurableBackend for SneakyBackend {
        async fn save_message(
            &self,
            _session: &SessionId,
            _message: &Message,
        ) -> Result<(), BackendError> {
            Ok(())
        }

        async fn get_messages(&self, session: &SessionId) -> Result<Vec<Message>, BackendError> {
            if let Some(store) = self.store.lock().await.clone() {
                store
                    .append(session, Message::user("appended-during-fetch"))
                    .await;
            }
            Ok(vec![Message::user("fetched")])
        }

        async fn save_trace(&self, _trace: TraceRecord) -> Result<(), BackendError> {
            Ok(())
        }

        async fn search_knowledge(&self, _query: &str) -> Result<serde_json::Value, BackendError> {
            Ok(serde_json::Value::Null)
        }

        async fn search_products(&self, _query: &str) -> Result<serde_json::Value, BackendError> {
            Ok(serde_json::Value::Null)
        }

        async fn generate_page(
            &self,
            _params: serde_json::Value,
        ) -> Result<serde_json::Value, BackendError> {
            Ok(serde_json::Value::Null)
        }
    }

    /// Summarizer that signals entry and blocks until released.
    struct GatedSummarizer {
        entered: Arc<tokio::sync::Notify>,
        release: Arc<tokio::sync::Notify>,
    }

    #[async_trait]
    impl Summarizer for GatedSummarizer {
        async fn summarize(
            &self,
            messages: &[Message],
            _instructions: &str,
        ) -> Result<String, MemoryError> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(format!("summary of {} messages", messages.len()))
        }
    }

    /// Summarizer that captures the instructions it was called with.
    #[derive(Default)]
    struct StubSummarizer {
        calls: AtomicUsize,
        last_instructions: Mutex<String>,
        fail: bool,
    }

    #[async_trait]
    impl Summarizer for StubSummarizer {
        async fn summarize(
            &self,
            messages: &[Message],
            instructions: &str,
        ) -> Result<String, MemoryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_instructions.lock().await = instructions.to_string();
            if self.fail {
                return Err(MemoryError::SummarizationFailed("stub failure".into()));
            }
            Ok(format!("summary of {} messages", messages.len()))
        }
    }

    fn store_with(summarizer: StubSummarizer) -> (Arc<ConversationStore>, Arc<RecordingBackend>) {
        let backend = Arc::new(RecordingBackend::default());
        let store = Arc::new(ConversationStore::new(
            backend.clone(),
            Arc::new(summarizer),
        ));
        (store, backend)
    }

    /// Poll until the cached log for `session` satisfies `pred`.
    async fn wait_for_cache(
        store: &Arc<ConversationStore>,
        session: &SessionId,
        pred: impl Fn(&[Message]) -> bool,
    ) -> Vec<Message> {
        for _ in 0..200 {
            let cached = store.read_cached(session).await;
            if pred(&cached) {
                return cached;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("cache never reached expected state");
    }

    fn long_text() -> String {
        // 2000 chars → 800 estimated tokens per message
        "x".repeat(2000)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn append_updates_cache_and_replicates() {
        let (store, backend) = store_with(StubSummarizer::default());
        let session = SessionId::from("s1");

        store.append(&session, Message::user("hello")).await;
        assert_eq!(store.read_cached(&session).await.len(), 1);

        // Replication is fire-and-forget; give the task a moment.
        for _ in 0..100 {
            if backend.saves.load(Ordering::SeqCst) == 1 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("message never replicated");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sixteen_short_messages_do_not_compact() {
        let (store, _) = store_with(StubSummarizer::default());
        let session = SessionId::from("s1");

        // 16 > threshold(15) but trivially under the token budget.
        for i in 0..16 {
            store.append(&session, Message::user(format!("msg{i}"))).await;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.read_cached(&session).await.len(), 16);
        assert!(store.compacted(&session).await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sixteen_long_messages_compact_to_summary_plus_ten() {
        let (store, _) = store_with(StubSummarizer::default());
        let session = SessionId::from("s1");

        for i in 0..16 {
            store
                .append(&session, Message::user(format!("{i}:{}", long_text())))
                .await;
        }

        let cached = wait_for_cache(&store, &session, |c| {
            c.first().is_some_and(Message::is_summary)
        })
        .await;

        // [summary, msg7..msg16]
        assert_eq!(cached.len(), 11);
        assert!(cached[0].is_summary());
        assert!(cached[1].content.as_text().starts_with("6:"));
        assert!(cached[10].content.as_text().starts_with("15:"));

        let records = store.compacted(&session).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message_count, 6);
        assert_eq!(records[0].from_index, 0);
        assert_eq!(records[0].to_index, 5);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn exceeding_hard_ceiling_compacts_regardless_of_tokens() {
        let (store, _) = store_with(StubSummarizer::default());
        let session = SessionId::from("s1");

        // 21 tiny messages: token estimate is way under budget, but the
        // hard ceiling (20) forces compaction.
        for i in 0..21 {
            store.append(&session, Message::user(format!("m{i}"))).await;
        }

        let cached = wait_for_cache(&store, &session, |c| {
            c.first().is_some_and(Message::is_summary)
        })
        .await;
        assert_eq!(cached.len(), 11);

        let records = store.compacted(&session).await;
        assert_eq!(records[0].message_count, 11);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn second_compaction_requests_merge() {
        let summarizer = StubSummarizer::default();
        let backend = Arc::new(RecordingBackend::default());
        let summarizer = Arc::new(summarizer);
        let store = Arc::new(ConversationStore::new(backend, summarizer.clone()));
        let session = SessionId::from("s1");

        for i in 0..21 {
            store.append(&session, Message::user(format!("m{i}"))).await;
        }
        wait_for_cache(&store, &session, |c| {
            c.first().is_some_and(Message::is_summary)
        })
        .await;
        assert!(
            !summarizer
                .last_instructions
                .lock()
                .await
                .to_lowercase()
                .contains("merge")
        );

        // Push past the ceiling again; the prior summary is now inside the
        // prefix being compacted.
        for i in 21..31 {
            store.append(&session, Message::user(format!("m{i}"))).await;
        }
        wait_for_cache(&store, &session, |c| {
            c.len() == 11
                && c.first().is_some_and(Message::is_summary)
                && c[1].content.as_text() == "m21"
        })
        .await;

        let records = store.compacted(&session).await;
        assert_eq!(records.len(), 2);
        // Second record covers the prior summary plus 10 originals.
        assert_eq!(records[1].message_count, 11);
        assert_eq!(records[1].from_index, records[0].to_index + 1);
        assert!(
            summarizer
                .last_instructions
                .lock()
                .await
                .to_lowercase()
                .contains("merge")
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_summarization_leaves_log_uncompacted() {
        let (store, _) = store_with(StubSummarizer {
            fail: true,
            ..Default::default()
        });
        let session = SessionId::from("s1");

        for i in 0..21 {
            store.append(&session, Message::user(format!("m{i}"))).await;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(store.read_cached(&session).await.len(), 21);
        assert!(store.compacted(&session).await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn read_or_fetch_populates_cache_on_miss() {
        let backend = Arc::new(RecordingBackend::default());
        backend.stored.lock().await.push(Message::user("restored"));
        let store = Arc::new(ConversationStore::new(
            backend,
            Arc::new(StubSummarizer::default()),
        ));
        let session = SessionId::from("cold");

        let fetched = store.read_or_fetch(&session).await;
        assert_eq!(fetched.len(), 1);
        // Now cached.
        assert_eq!(store.read_cached(&session).await.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn read_or_fetch_yields_cache_contents_when_append_races_the_fetch() {
        let backend = Arc::new(SneakyBackend::default());
        let store = Arc::new(ConversationStore::new(
            backend.clone(),
            Arc::new(StubSummarizer::default()),
        ));
        *backend.store.lock().await = Some(store.clone());
        let session = SessionId::from("cold");

        let fetched = store.read_or_fetch(&session).await;

        // The append won the cache slot mid-fetch; the caller must see the
        // same log that later reads will, not the stale backend copy.
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].content.as_text(), "appended-during-fetch");
        let cached = store.read_cached(&session).await;
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].content.as_text(), "appended-during-fetch");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn replace_during_compaction_discards_pass_and_recovers() {
        let entered = Arc::new(tokio::sync::Notify::new());
        let release = Arc::new(tokio::sync::Notify::new());
        let backend = Arc::new(RecordingBackend::default());
        let store = Arc::new(ConversationStore::new(
            backend,
            Arc::new(GatedSummarizer {
                entered: entered.clone(),
                release: release.clone(),
            }),
        ));
        let session = SessionId::from("s1");

        for i in 0..21 {
            store.append(&session, Message::user(format!("m{i}"))).await;
        }
        entered.notified().await;

        // The log shrinks to a single message while the summarizer is still
        // running over the old 11-message prefix.
        store.replace(&session, vec![Message::user("fresh")]).await;
        release.notify_one();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // The stale pass is discarded, never spliced over the new log.
        let cached = store.read_cached(&session).await;
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].content.as_text(), "fresh");
        assert!(store.compacted(&session).await.is_empty());

        // The session must not be stuck: pushing past the ceiling again
        // runs a fresh compaction pass.
        for i in 0..20 {
            store.append(&session, Message::user(format!("n{i}"))).await;
        }
        for _ in 0..200 {
            release.notify_one();
            if store
                .read_cached(&session)
                .await
                .first()
                .is_some_and(Message::is_summary)
            {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let cached = store.read_cached(&session).await;
        assert!(
            cached.first().is_some_and(Message::is_summary),
            "compaction never ran again after the discarded pass"
        );
        assert_eq!(cached.len(), 11);
        assert_eq!(store.compacted(&session).await.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn replace_and_clear_are_cache_only() {
        let (store, backend) = store_with(StubSummarizer::default());
        let session = SessionId::from("s1");

        store
            .replace(&session, vec![Message::user("a"), Message::user("b")])
            .await;
        assert_eq!(store.read_cached(&session).await.len(), 2);
        // replace never touches the backend
        assert_eq!(backend.saves.load(Ordering::SeqCst), 0);

        store.clear(&session).await;
        assert!(store.read_cached(&session).await.is_empty());
    }
}
