//! Memory orchestration.
//!
//! [`MemoryManager`] is the write path for everything Attune remembers
//! about a user. Every load-mutate-save cycle runs under that user's async
//! lock, so concurrent turns and session operations for the same user
//! serialize instead of clobbering each other's saves.
//!
//! Summarization stays outside the lock. Ending a session persists the
//! close first, then calls the summarizer and attaches the result in a
//! second short critical section. A slow or failing summarizer can leave a
//! session unsummarized but never un-end it or block other users.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use attune_config::MemoryConfig;
use attune_core::{
    ChatMessage, ChatRequest, EmotionMap, EmotionRecord, EmotionSnapshot, LanguageModel,
    MemoryError, MemoryStore, ModelError, ProfileFields, Result, SessionMemory, Turn, UserMemory,
    UserProfile,
};

use crate::topics::{KeywordTopicExtractor, TopicExtractor};

/// System prompt for the summarization call.
const SUMMARY_SYSTEM_PROMPT: &str =
    "You condense counseling conversations into factual, neutral summaries.";
/// Instruction prefixed to the transcript.
const SUMMARY_INSTRUCTION: &str =
    "Summarize the following counseling dialogue in under 100 characters:";
/// Generation cap for summaries.
const SUMMARY_MAX_TOKENS: u32 = 200;
/// Characters of the user message kept as context on an emotion record.
const CONTEXT_SNIPPET_CHARS: usize = 100;
/// Emotion records averaged into the trend.
const EMOTION_TREND_WINDOW: usize = 10;
/// Importance assigned to topics mined from a summary.
const DEFAULT_TOPIC_IMPORTANCE: f32 = 0.5;

// ── Retrieval output ─────────────────────────────────────────────────────────

/// Memory distilled for prompt assembly.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MemoryContext {
    pub profile: Option<UserProfile>,
    /// Summarized past sessions, highest recency weight first.
    pub sessions: Vec<ScoredSession>,
    pub emotion_trend: EmotionTrend,
    pub main_issues: Vec<String>,
}

/// A past session weighted by recency.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredSession {
    pub session_id: String,
    pub summary: String,
    pub main_topics: Vec<String>,
    /// Recency weight in `(0, 1]`; newer sessions score higher.
    pub score: f64,
}

/// Average emotion intensity over the recent record window.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EmotionTrend {
    /// Per-label averages over the records that mention each label.
    pub average: EmotionMap,
    pub record_count: usize,
}

// ── Manager ──────────────────────────────────────────────────────────────────

/// Orchestrates tiered user memory over a pluggable store.
pub struct MemoryManager {
    store: Arc<dyn MemoryStore>,
    summarizer: Option<Arc<dyn LanguageModel>>,
    topics: Arc<dyn TopicExtractor>,
    config: MemoryConfig,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl MemoryManager {
    pub fn new(store: Arc<dyn MemoryStore>) -> Self {
        Self {
            store,
            summarizer: None,
            topics: Arc::new(KeywordTopicExtractor::default()),
            config: MemoryConfig::default(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Attach a model used to summarize sessions when they end.
    pub fn with_summarizer(mut self, summarizer: Arc<dyn LanguageModel>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    pub fn with_topic_extractor(mut self, topics: Arc<dyn TopicExtractor>) -> Self {
        self.topics = topics;
        self
    }

    pub fn with_config(mut self, config: MemoryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    async fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(user_id.to_string()).or_default().clone()
    }

    /// Create a new user record and return it.
    ///
    /// Fails with [`MemoryError::UserExists`] if the user already has one.
    pub async fn create_user(&self, user_id: &str, fields: ProfileFields) -> Result<UserMemory> {
        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;

        if self.store.exists(user_id).await? {
            return Err(MemoryError::UserExists(user_id.to_string()).into());
        }
        let memory = UserMemory::new(user_id, fields);
        self.store.save(&memory).await?;
        debug!(user_id, "created user");
        Ok(memory)
    }

    /// Load a user's full memory record.
    pub async fn get_user_memory(&self, user_id: &str) -> Result<UserMemory> {
        match self.store.load(user_id).await? {
            Some(memory) => Ok(memory),
            None => Err(MemoryError::UserNotFound(user_id.to_string()).into()),
        }
    }

    /// Open a new session for the user and return its id.
    ///
    /// At most one session per user is active. An earlier session left open
    /// is closed here first and summarized on a best-effort basis, exactly
    /// as [`MemoryManager::end_session`] would have done.
    pub async fn start_session(&self, user_id: &str) -> Result<String> {
        let lock = self.user_lock(user_id).await;
        let (session_id, stale) = {
            let _guard = lock.lock().await;
            let mut memory = match self.store.load(user_id).await? {
                Some(m) => m,
                None => return Err(MemoryError::UserNotFound(user_id.to_string()).into()),
            };

            let stale = match memory.active_session_mut() {
                Some(open) => {
                    warn!(user_id, session_id = %open.session_id, "closing stale active session");
                    open.end_time = Some(Utc::now());
                    let transcript =
                        (!open.turns.is_empty()).then(|| format_transcript(&open.turns));
                    Some((open.session_id.clone(), transcript))
                }
                None => None,
            };

            let session = SessionMemory::open(user_id);
            let session_id = session.session_id.clone();
            memory.sessions.push(session);
            self.store.save(&memory).await?;
            (session_id, stale)
        };

        if let Some((stale_id, Some(transcript))) = stale {
            self.attach_summary(user_id, &stale_id, &transcript).await;
        }

        debug!(user_id, %session_id, "started session");
        Ok(session_id)
    }

    /// Close a session, then summarize it.
    ///
    /// Closing is the durable part and the only part that can fail.
    /// Summarization runs after the close is persisted; if the summarizer
    /// is absent, slow, or failing, the session stays unsummarized and
    /// this still returns `Ok`. Unknown users and sessions are ignored.
    pub async fn end_session(&self, user_id: &str, session_id: &str) -> Result<()> {
        let lock = self.user_lock(user_id).await;
        let transcript = {
            let _guard = lock.lock().await;
            let mut memory = match self.store.load(user_id).await? {
                Some(m) => m,
                None => {
                    debug!(user_id, "end_session for unknown user, ignoring");
                    return Ok(());
                }
            };
            let Some(session) = memory.session_mut(session_id) else {
                debug!(user_id, session_id, "end_session for unknown session, ignoring");
                return Ok(());
            };
            if !session.is_active() {
                debug!(user_id, session_id, "session already ended, ignoring");
                return Ok(());
            }

            session.end_time = Some(Utc::now());
            let transcript =
                (!session.turns.is_empty()).then(|| format_transcript(&session.turns));
            self.store.save(&memory).await?;
            transcript
        };

        if let Some(transcript) = transcript {
            self.attach_summary(user_id, session_id, &transcript).await;
        }
        Ok(())
    }

    /// Summarize a closed session and write the result back.
    ///
    /// Best-effort throughout: the close is already persisted, so every
    /// failure here is logged and swallowed. An existing summary is never
    /// overwritten.
    async fn attach_summary(&self, user_id: &str, session_id: &str, transcript: &str) {
        if !self.config.auto_summarize {
            return;
        }
        let Some(summarizer) = &self.summarizer else {
            return;
        };

        let summary = match self.summarize(summarizer.as_ref(), transcript).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(user_id, session_id, error = %e, "session summarization failed");
                return;
            }
        };
        if summary.is_empty() {
            debug!(user_id, session_id, "summarizer returned empty text, skipping");
            return;
        }
        let topics = self.topics.extract(&summary);

        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;
        let mut memory = match self.store.load(user_id).await {
            Ok(Some(memory)) => memory,
            Ok(None) => return,
            Err(e) => {
                warn!(user_id, session_id, error = %e, "could not reload memory to attach summary");
                return;
            }
        };
        {
            let Some(session) = memory.session_mut(session_id) else {
                return;
            };
            if session.session_summary.is_some() {
                return;
            }
            session.session_summary = Some(summary);
            session.main_topics = topics.clone();
        }
        if !topics.is_empty() {
            memory
                .trends
                .record_topics(session_id, topics, DEFAULT_TOPIC_IMPORTANCE);
        }
        if let Err(e) = self.store.save(&memory).await {
            warn!(user_id, session_id, error = %e, "could not persist session summary");
        }
    }

    async fn summarize(
        &self,
        summarizer: &dyn LanguageModel,
        transcript: &str,
    ) -> std::result::Result<String, ModelError> {
        let request = ChatRequest::new(vec![
            ChatMessage::system(SUMMARY_SYSTEM_PROMPT),
            ChatMessage::user(format!("{SUMMARY_INSTRUCTION}\n\n{transcript}")),
        ])
        .with_max_tokens(SUMMARY_MAX_TOKENS);

        let timeout = Duration::from_secs(self.config.summarize_timeout_secs);
        match tokio::time::timeout(timeout, summarizer.generate(request)).await {
            Ok(Ok(response)) => Ok(response.text.trim().to_string()),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ModelError::Generation(format!(
                "timed out after {}s",
                self.config.summarize_timeout_secs
            ))),
        }
    }

    /// Append a turn to an active session and record its emotion reading.
    ///
    /// Unknown users and sessions are ignored so a race with deletion
    /// cannot fail the dialogue path. Turns arriving after the session
    /// ended are dropped with a warning.
    pub async fn add_turn(
        &self,
        user_id: &str,
        session_id: &str,
        user_message: &str,
        assistant_message: &str,
        emotion: Option<EmotionMap>,
    ) -> Result<()> {
        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;

        let mut memory = match self.store.load(user_id).await? {
            Some(m) => m,
            None => {
                debug!(user_id, "add_turn for unknown user, ignoring");
                return Ok(());
            }
        };
        let Some(session) = memory.session_mut(session_id) else {
            debug!(user_id, session_id, "add_turn for unknown session, ignoring");
            return Ok(());
        };
        if !session.is_active() {
            warn!(user_id, session_id, "add_turn after session end, dropping turn");
            return Ok(());
        }

        let turn = Turn::new(user_message, assistant_message, emotion.clone());
        let timestamp = turn.timestamp;
        session.turns.push(turn);

        if let Some(emotion) = emotion {
            session.emotion_trajectory.push(EmotionSnapshot {
                timestamp,
                emotion: emotion.clone(),
            });
            let snippet: String = user_message.chars().take(CONTEXT_SNIPPET_CHARS).collect();
            memory
                .trends
                .record_emotion(session_id, emotion, Some(snippet));
        }

        self.store.save(&memory).await?;
        Ok(())
    }

    /// Distill a user's memory for prompt assembly.
    ///
    /// Weighs the most recent sessions by recency decay, keeps the top
    /// `top_k` that carry a summary, and averages recent emotion records
    /// into a trend. Never fails: a missing or unreadable record yields an
    /// empty context so the conversation can continue without memory.
    pub async fn retrieve_relevant_memory(
        &self,
        user_id: &str,
        current_context: &str,
        top_k: usize,
    ) -> MemoryContext {
        let memory = match self.store.load(user_id).await {
            Ok(Some(memory)) => memory,
            Ok(None) => {
                debug!(user_id, "no memory record, returning empty context");
                return MemoryContext::default();
            }
            Err(e) => {
                warn!(user_id, error = %e, "memory unavailable, returning empty context");
                return MemoryContext::default();
            }
        };

        let window = memory.recent_sessions(self.config.max_history_sessions);
        let mut scored: Vec<(f64, &SessionMemory)> = window
            .iter()
            .rev()
            .enumerate()
            .map(|(i, session)| (self.config.decay_factor.powi(i as i32), session))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let sessions: Vec<ScoredSession> = scored
            .into_iter()
            .filter(|(_, session)| session.has_summary())
            .take(top_k)
            .map(|(score, session)| ScoredSession {
                session_id: session.session_id.clone(),
                summary: session.session_summary.clone().unwrap_or_default(),
                main_topics: session.main_topics.clone(),
                score,
            })
            .collect();

        let emotion_trend = average_emotions(memory.trends.recent_emotions(EMOTION_TREND_WINDOW));

        debug!(
            user_id,
            top_k,
            context_len = current_context.len(),
            sessions = sessions.len(),
            emotion_records = emotion_trend.record_count,
            "retrieved memory context"
        );

        MemoryContext {
            main_issues: memory.profile.main_issues.clone(),
            profile: Some(memory.profile),
            sessions,
            emotion_trend,
        }
    }

    /// Merge profile fields into a user's record. Unknown users are ignored.
    pub async fn update_user_profile(&self, user_id: &str, fields: ProfileFields) -> Result<()> {
        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;

        let mut memory = match self.store.load(user_id).await? {
            Some(m) => m,
            None => {
                debug!(user_id, "profile update for unknown user, ignoring");
                return Ok(());
            }
        };
        memory.profile.apply(fields);
        self.store.save(&memory).await?;
        Ok(())
    }

    /// Record a counseling intervention in the long-term history.
    pub async fn record_intervention(
        &self,
        user_id: &str,
        session_id: &str,
        intervention_type: &str,
        effectiveness: Option<f32>,
        notes: Option<String>,
    ) -> Result<()> {
        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;

        let mut memory = match self.store.load(user_id).await? {
            Some(m) => m,
            None => {
                debug!(user_id, "intervention for unknown user, ignoring");
                return Ok(());
            }
        };
        memory
            .trends
            .record_intervention(session_id, intervention_type, effectiveness, notes);
        self.store.save(&memory).await?;
        Ok(())
    }

    /// Remove a user's record entirely. Returns whether anything existed.
    pub async fn delete_user(&self, user_id: &str) -> Result<bool> {
        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;

        let deleted = self.store.delete(user_id).await?;
        // Drop the lock entry so the table tracks only live users. A waiter
        // still holding the old handle proceeds and finds no record.
        self.locks.lock().await.remove(user_id);
        if deleted {
            debug!(user_id, "deleted user memory");
        }
        Ok(deleted)
    }
}

/// Render turns as a plain transcript for the summarizer.
fn format_transcript(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|t| format!("Client: {}\nCounselor: {}", t.user_message, t.assistant_message))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Average emotion intensity over a window of records.
///
/// Each label is averaged over the records that mention it, so a label
/// read once at 0.8 averages 0.8 regardless of the window size.
/// `record_count` reports the window size.
fn average_emotions(records: &[EmotionRecord]) -> EmotionTrend {
    if records.is_empty() {
        return EmotionTrend::default();
    }
    let mut sums: BTreeMap<String, (f32, usize)> = BTreeMap::new();
    for record in records {
        for (label, value) in &record.emotions {
            let entry = sums.entry(label.clone()).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }
    }
    let average: EmotionMap = sums
        .into_iter()
        .map(|(label, (sum, seen))| (label, sum / seen as f32))
        .collect();
    EmotionTrend {
        average,
        record_count: records.len(),
    }
}
