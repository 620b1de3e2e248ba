//! Persistent memory records.
//!
//! These types define the on-disk shape of a user's memory: raw session
//! transcripts, the distilled profile, and long-term trend histories. The
//! serialized layout is snake_case JSON with ISO-8601 timestamps, and
//! deserialization tolerates missing optional fields so older records
//! keep loading as the schema grows.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Emotion label to intensity, e.g. `{"anxiety": 0.8}`.
///
/// A `BTreeMap` keeps serialized output and trend math deterministic.
pub type EmotionMap = BTreeMap<String, f32>;

// ── Turns and sessions ───────────────────────────────────────────────────────

/// One user/assistant exchange inside a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub user_message: String,
    pub assistant_message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion: Option<EmotionMap>,
}

impl Turn {
    pub fn new(
        user_message: impl Into<String>,
        assistant_message: impl Into<String>,
        emotion: Option<EmotionMap>,
    ) -> Self {
        Self {
            user_message: user_message.into(),
            assistant_message: assistant_message.into(),
            timestamp: Utc::now(),
            emotion,
        }
    }
}

/// A dated emotion reading along a session's trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionSnapshot {
    pub timestamp: DateTime<Utc>,
    pub emotion: EmotionMap,
}

/// One conversation session: raw turns plus post-session distillation.
///
/// A session is active while `end_time` is `None`. The summary and topic
/// fields are filled in after close by the summarization pass and stay
/// empty when that pass is unavailable or fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMemory {
    pub session_id: String,
    pub user_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub turns: Vec<Turn>,
    pub session_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub main_topics: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub emotion_trajectory: Vec<EmotionSnapshot>,
}

impl SessionMemory {
    /// Start a new active session with a generated id.
    pub fn open(user_id: impl Into<String>) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            start_time: Utc::now(),
            end_time: None,
            turns: Vec::new(),
            session_summary: None,
            main_topics: Vec::new(),
            emotion_trajectory: Vec::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.end_time.is_none()
    }

    /// True when a non-empty summary has been attached.
    pub fn has_summary(&self) -> bool {
        self.session_summary
            .as_deref()
            .is_some_and(|s| !s.is_empty())
    }

    /// The last `n` turns in chronological order.
    pub fn recent_turns(&self, n: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }
}

// ── User profile ─────────────────────────────────────────────────────────────

/// A dated life event worth remembering across sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifeEvent {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occurred_at: Option<DateTime<Utc>>,
}

/// Stable facts about a user, updated explicitly rather than per-turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupation: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub main_issues: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub life_events: Vec<LifeEvent>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            age: None,
            gender: None,
            occupation: None,
            main_issues: Vec::new(),
            life_events: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge in the provided fields, leaving absent ones untouched.
    pub fn apply(&mut self, fields: ProfileFields) {
        if let Some(age) = fields.age {
            self.age = Some(age);
        }
        if let Some(gender) = fields.gender {
            self.gender = Some(gender);
        }
        if let Some(occupation) = fields.occupation {
            self.occupation = Some(occupation);
        }
        if let Some(main_issues) = fields.main_issues {
            self.main_issues = main_issues;
        }
        if let Some(life_events) = fields.life_events {
            self.life_events = life_events;
        }
        self.updated_at = Utc::now();
    }
}

/// Partial profile update. `None` fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_issues: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub life_events: Option<Vec<LifeEvent>>,
}

// ── Long-term trends ─────────────────────────────────────────────────────────

/// One per-turn emotion reading in the long-term history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionRecord {
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub emotions: EmotionMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

fn default_importance() -> f32 {
    0.5
}

/// Topics surfaced by one session's summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicRecord {
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub topics: Vec<String>,
    #[serde(default = "default_importance")]
    pub importance: f32,
}

/// A counseling intervention and how well it landed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionRecord {
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub intervention_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effectiveness: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Append-only histories spanning all of a user's sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongTermTrends {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub emotion_history: Vec<EmotionRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topic_history: Vec<TopicRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub intervention_history: Vec<InterventionRecord>,
}

impl LongTermTrends {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            emotion_history: Vec::new(),
            topic_history: Vec::new(),
            intervention_history: Vec::new(),
        }
    }

    pub fn record_emotion(
        &mut self,
        session_id: impl Into<String>,
        emotions: EmotionMap,
        context: Option<String>,
    ) {
        self.emotion_history.push(EmotionRecord {
            timestamp: Utc::now(),
            session_id: session_id.into(),
            emotions,
            context,
        });
    }

    pub fn record_topics(
        &mut self,
        session_id: impl Into<String>,
        topics: Vec<String>,
        importance: f32,
    ) {
        self.topic_history.push(TopicRecord {
            timestamp: Utc::now(),
            session_id: session_id.into(),
            topics,
            importance,
        });
    }

    pub fn record_intervention(
        &mut self,
        session_id: impl Into<String>,
        intervention_type: impl Into<String>,
        effectiveness: Option<f32>,
        notes: Option<String>,
    ) {
        self.intervention_history.push(InterventionRecord {
            timestamp: Utc::now(),
            session_id: session_id.into(),
            intervention_type: intervention_type.into(),
            effectiveness,
            notes,
        });
    }

    /// The last `n` emotion records in chronological order.
    pub fn recent_emotions(&self, n: usize) -> &[EmotionRecord] {
        let start = self.emotion_history.len().saturating_sub(n);
        &self.emotion_history[start..]
    }
}

// ── Aggregate root ───────────────────────────────────────────────────────────

/// Everything remembered about one user. The unit of load and save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMemory {
    pub user_id: String,
    pub profile: UserProfile,
    #[serde(default)]
    pub sessions: Vec<SessionMemory>,
    pub trends: LongTermTrends,
}

impl UserMemory {
    pub fn new(user_id: impl Into<String>, fields: ProfileFields) -> Self {
        let user_id = user_id.into();
        let mut profile = UserProfile::new(user_id.clone());
        profile.apply(fields);
        Self {
            user_id: user_id.clone(),
            profile,
            sessions: Vec::new(),
            trends: LongTermTrends::new(user_id),
        }
    }

    /// The most recent session that has not been closed, if any.
    pub fn active_session(&self) -> Option<&SessionMemory> {
        self.sessions.iter().rev().find(|s| s.is_active())
    }

    pub fn active_session_mut(&mut self) -> Option<&mut SessionMemory> {
        self.sessions.iter_mut().rev().find(|s| s.is_active())
    }

    pub fn session(&self, session_id: &str) -> Option<&SessionMemory> {
        self.sessions.iter().find(|s| s.session_id == session_id)
    }

    pub fn session_mut(&mut self, session_id: &str) -> Option<&mut SessionMemory> {
        self.sessions.iter_mut().find(|s| s.session_id == session_id)
    }

    /// The last `n` sessions in chronological order.
    pub fn recent_sessions(&self, n: usize) -> &[SessionMemory] {
        let start = self.sessions.len().saturating_sub(n);
        &self.sessions[start..]
    }
}
