//! Context assembly.
//!
//! Builds the message list sent to the language model from four layers:
//! the base system prompt, memory and knowledge woven into the system
//! message, recent raw turns of the current session, and the current user
//! message. A token budget bounds the whole thing.
//!
//! Budget rules: the system message and the current user message are
//! always kept. History fills the remainder newest first, and the walk
//! stops at the first message that does not fit, so the kept turns are
//! always a contiguous chronological suffix of the session.

use std::sync::Arc;

use tracing::{debug, warn};

use attune_config::DialogueConfig;
use attune_core::{ChatMessage, TokenCounter, Turn};
use attune_knowledge::KnowledgeRetriever;
use attune_memory::{EmotionTrend, MemoryContext, MemoryManager, ScoredSession};

use crate::token::HeuristicTokenCounter;

/// A fully assembled prompt plus accounting.
#[derive(Debug, Clone)]
pub struct AssembledContext {
    /// System message first, then kept history, then the current message.
    pub messages: Vec<ChatMessage>,
    pub metadata: ContextMetadata,
}

/// Accounting for one assembly pass.
#[derive(Debug, Clone, Default)]
pub struct ContextMetadata {
    pub total_tokens: usize,
    pub budget: usize,
    pub utilization_pct: f32,
    /// History messages that made it into the context.
    pub history_included: usize,
    /// History messages left out to fit the budget.
    pub history_dropped: usize,
    /// True when system plus current message alone exceed the budget.
    pub over_budget: bool,
}

/// Assembles prompts from memory, knowledge, and session history.
pub struct ContextAssembler {
    memory: Arc<MemoryManager>,
    knowledge: Arc<KnowledgeRetriever>,
    counter: Arc<dyn TokenCounter>,
    config: DialogueConfig,
}

impl ContextAssembler {
    pub fn new(memory: Arc<MemoryManager>, knowledge: Arc<KnowledgeRetriever>) -> Self {
        Self {
            memory,
            knowledge,
            counter: Arc::new(HeuristicTokenCounter),
            config: DialogueConfig::default(),
        }
    }

    pub fn with_token_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.counter = counter;
        self
    }

    pub fn with_config(mut self, config: DialogueConfig) -> Self {
        self.config = config;
        self
    }

    /// Assemble the prompt for one turn. Never fails: memory and knowledge
    /// stages degrade to empty sections when their sources are unavailable.
    pub async fn build_context(
        &self,
        user_id: &str,
        session_id: &str,
        user_message: &str,
    ) -> AssembledContext {
        let (knowledge, (memory_context, history)) = tokio::join!(
            self.gather_knowledge(user_id, user_message),
            self.gather_memory(user_id, session_id, user_message)
        );

        let system = self.render_system(memory_context.as_ref(), knowledge.as_deref());
        let history_messages = flatten_turns(&history);
        apply_budget(
            self.counter.as_ref(),
            self.config.token_budget,
            system,
            history_messages,
            user_message,
        )
    }

    async fn gather_knowledge(&self, user_id: &str, user_message: &str) -> Option<String> {
        if !self.config.enable_knowledge {
            return None;
        }
        let retrieved = self.knowledge.retrieve(user_message, Some(user_id)).await;
        Some(retrieved.combined_text)
    }

    async fn gather_memory(
        &self,
        user_id: &str,
        session_id: &str,
        user_message: &str,
    ) -> (Option<MemoryContext>, Vec<Turn>) {
        if !self.config.enable_memory {
            return (None, Vec::new());
        }
        let context = self
            .memory
            .retrieve_relevant_memory(user_id, user_message, self.config.memory_top_k)
            .await;

        let history = match self.memory.get_user_memory(user_id).await {
            Ok(memory) => memory
                .session(session_id)
                .map(|s| s.recent_turns(self.config.recent_turn_window).to_vec())
                .unwrap_or_default(),
            Err(e) => {
                debug!(user_id, error = %e, "no session history available");
                Vec::new()
            }
        };
        (Some(context), history)
    }

    /// Render the system message: base prompt, then memory sections, then
    /// retrieved knowledge.
    fn render_system(&self, memory: Option<&MemoryContext>, knowledge: Option<&str>) -> String {
        let mut sections = vec![self.config.system_prompt.clone()];
        if let Some(memory) = memory {
            sections.push(render_profile(memory));
            sections.push(render_summaries(&memory.sessions));
            sections.push(render_trend(&memory.emotion_trend));
        }
        if let Some(knowledge) = knowledge {
            sections.push(render_knowledge(knowledge));
        }
        sections.join("\n\n")
    }
}

// ── Section rendering ────────────────────────────────────────────────────────

fn render_profile(memory: &MemoryContext) -> String {
    let mut out = String::from("[User Profile]");
    if let Some(profile) = &memory.profile {
        if let Some(age) = profile.age {
            out.push_str(&format!("\nAge: {age}"));
        }
        if let Some(gender) = &profile.gender {
            out.push_str(&format!("\nGender: {gender}"));
        }
        if let Some(occupation) = &profile.occupation {
            out.push_str(&format!("\nOccupation: {occupation}"));
        }
        if !memory.main_issues.is_empty() {
            out.push_str(&format!("\nMain issues: {}", memory.main_issues.join(", ")));
        }
    }
    if out == "[User Profile]" {
        out.push_str("\nNo profile data on file.");
    }
    out
}

fn render_summaries(sessions: &[ScoredSession]) -> String {
    if sessions.is_empty() {
        return "[Recent Session Summaries]\nNo prior session summaries.".to_string();
    }
    let mut out = String::from("[Recent Session Summaries]");
    for session in sessions {
        out.push_str(&format!("\n- {}", session.summary));
    }
    out
}

fn render_trend(trend: &EmotionTrend) -> String {
    if trend.average.is_empty() {
        return "[Emotion Trend]\nNo emotion data recorded.".to_string();
    }
    let mut out = String::from("[Emotion Trend]");
    for (label, value) in &trend.average {
        out.push_str(&format!("\n{label}: {value:.2}"));
    }
    out
}

fn render_knowledge(text: &str) -> String {
    if text.is_empty() {
        "[Retrieved Knowledge]\nNothing relevant retrieved.".to_string()
    } else {
        text.to_string()
    }
}

/// Flatten turns into chronological user/assistant message pairs.
fn flatten_turns(turns: &[Turn]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(turns.len() * 2);
    for turn in turns {
        messages.push(ChatMessage::user(turn.user_message.clone()));
        messages.push(ChatMessage::assistant(turn.assistant_message.clone()));
    }
    messages
}

// ── Budget enforcement ───────────────────────────────────────────────────────

/// Enforce the token budget over system, history, and current message.
///
/// The system and current messages are never dropped or truncated; if they
/// alone exceed the budget, the result is flagged `over_budget` and ships
/// without history. Otherwise history is walked newest to oldest and the
/// walk stops at the first message that does not fit.
fn apply_budget(
    counter: &dyn TokenCounter,
    budget: usize,
    system: String,
    history: Vec<ChatMessage>,
    current: &str,
) -> AssembledContext {
    let reserved = counter.count(&system) + counter.count(current);
    let total_history = history.len();

    let mut kept: Vec<ChatMessage> = Vec::new();
    let mut history_tokens = 0;
    let mut over_budget = false;

    if reserved > budget {
        warn!(reserved, budget, "system and current message alone exceed the budget");
        over_budget = true;
    } else {
        for message in history.into_iter().rev() {
            let cost = counter.count(&message.content);
            if reserved + history_tokens + cost > budget {
                break;
            }
            history_tokens += cost;
            kept.push(message);
        }
        kept.reverse();
    }

    let history_included = kept.len();
    let mut messages = Vec::with_capacity(history_included + 2);
    messages.push(ChatMessage::system(system));
    messages.extend(kept);
    messages.push(ChatMessage::user(current));

    let total_tokens = reserved + history_tokens;
    let utilization_pct = if budget == 0 {
        0.0
    } else {
        (total_tokens as f32 / budget as f32) * 100.0
    };

    AssembledContext {
        messages,
        metadata: ContextMetadata {
            total_tokens,
            budget,
            utilization_pct,
            history_included,
            history_dropped: total_history - history_included,
            over_budget,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attune_core::{EmotionMap, Role, UserProfile};

    fn msg_of(len: usize) -> ChatMessage {
        ChatMessage::user("y".repeat(len))
    }

    #[test]
    fn keeps_everything_under_budget() {
        let counter = HeuristicTokenCounter;
        let history = vec![msg_of(40), msg_of(40)];
        let ctx = apply_budget(&counter, 1000, "sys".into(), history, "now");
        assert_eq!(ctx.metadata.history_included, 2);
        assert_eq!(ctx.metadata.history_dropped, 0);
        assert!(!ctx.metadata.over_budget);
        assert_eq!(ctx.messages.len(), 4);
        assert_eq!(ctx.messages[0].role, Role::System);
        assert_eq!(ctx.messages[3].content, "now");
    }

    #[test]
    fn exact_budget_fits_no_history() {
        let counter = HeuristicTokenCounter;
        let system = "s".repeat(40); // 10 tokens
        let current = "c".repeat(20); // 5 tokens
        let history = vec![msg_of(4)];
        let ctx = apply_budget(&counter, 15, system, history, &current);
        assert!(!ctx.metadata.over_budget);
        assert_eq!(ctx.metadata.history_included, 0);
        assert_eq!(ctx.metadata.history_dropped, 1);
        assert_eq!(ctx.metadata.total_tokens, 15);
        assert_eq!(ctx.messages.len(), 2);
    }

    #[test]
    fn oversized_reserved_is_flagged_not_truncated() {
        let counter = HeuristicTokenCounter;
        let system = "s".repeat(400); // 100 tokens
        let ctx = apply_budget(&counter, 50, system.clone(), vec![msg_of(4)], "hi");
        assert!(ctx.metadata.over_budget);
        assert_eq!(ctx.metadata.history_included, 0);
        assert_eq!(ctx.messages.len(), 2);
        assert_eq!(ctx.messages[0].content, system);
    }

    #[test]
    fn budget_walk_stops_at_first_overflow() {
        let counter = HeuristicTokenCounter;
        let old = ChatMessage::user("o".repeat(20)); // 5 tokens
        let mid = ChatMessage::user("m".repeat(400)); // 100 tokens
        let new = ChatMessage::user("n".repeat(20)); // 5 tokens
        let ctx = apply_budget(&counter, 20, "sys".into(), vec![old, mid, new], "now");

        // reserved = 2; the newest fits, the middle one overflows, and the
        // walk stops there even though the oldest alone would still fit.
        assert_eq!(ctx.metadata.history_included, 1);
        assert_eq!(ctx.metadata.history_dropped, 2);
        assert_eq!(ctx.messages.len(), 3);
        assert_eq!(ctx.messages[1].content, "n".repeat(20));
    }

    #[test]
    fn kept_history_stays_chronological() {
        let counter = HeuristicTokenCounter;
        let history = vec![
            ChatMessage::user("first"),
            ChatMessage::assistant("second"),
            ChatMessage::user("third"),
        ];
        let ctx = apply_budget(&counter, 1000, "sys".into(), history, "now");
        let contents: Vec<&str> = ctx.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["sys", "first", "second", "third", "now"]);
    }

    #[test]
    fn turns_flatten_to_message_pairs() {
        let turns = vec![Turn::new("hi", "hello", None)];
        let messages = flatten_turns(&turns);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].role, Role::Assistant);
    }

    #[test]
    fn profile_section_renders_known_fields() {
        let mut profile = UserProfile::new("u1");
        profile.age = Some(34);
        profile.occupation = Some("designer".into());
        let memory = MemoryContext {
            main_issues: vec!["burnout".into(), "sleep".into()],
            profile: Some(profile),
            ..Default::default()
        };

        let text = render_profile(&memory);
        assert!(text.starts_with("[User Profile]"));
        assert!(text.contains("Age: 34"));
        assert!(text.contains("Occupation: designer"));
        assert!(text.contains("Main issues: burnout, sleep"));
        assert!(!text.contains("Gender"));
    }

    #[test]
    fn summaries_render_as_bullets() {
        let sessions = vec![
            ScoredSession {
                session_id: "s1".into(),
                summary: "Discussed sleep".into(),
                main_topics: vec![],
                score: 1.0,
            },
            ScoredSession {
                session_id: "s2".into(),
                summary: "Work worries".into(),
                main_topics: vec![],
                score: 0.95,
            },
        ];
        assert_eq!(
            render_summaries(&sessions),
            "[Recent Session Summaries]\n- Discussed sleep\n- Work worries"
        );
    }

    #[test]
    fn trend_renders_two_decimals() {
        let trend = EmotionTrend {
            average: EmotionMap::from([("anxiety".into(), 0.456)]),
            record_count: 3,
        };
        assert_eq!(render_trend(&trend), "[Emotion Trend]\nanxiety: 0.46");
    }

    #[test]
    fn empty_sections_use_sentinels() {
        assert!(render_summaries(&[]).contains("No prior session summaries."));
        assert!(render_trend(&EmotionTrend::default()).contains("No emotion data recorded."));
        assert!(render_knowledge("").contains("Nothing relevant retrieved."));
        let empty = MemoryContext::default();
        assert!(render_profile(&empty).contains("No profile data on file."));
    }
}
