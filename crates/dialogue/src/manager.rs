//! Dialogue orchestration.
//!
//! Ties the layers together for one conversational turn: assemble the
//! context, call the model, persist the exchange.

use std::sync::Arc;

use tracing::debug;

use attune_config::DialogueConfig;
use attune_core::{ChatRequest, EmotionMap, LanguageModel, Result, Usage};
use attune_knowledge::KnowledgeRetriever;
use attune_memory::MemoryManager;

use crate::assembler::{ContextAssembler, ContextMetadata};

/// One completed exchange.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub text: String,
    pub usage: Option<Usage>,
    pub metadata: ContextMetadata,
}

/// Runs conversational turns end to end.
pub struct DialogueManager {
    model: Arc<dyn LanguageModel>,
    memory: Arc<MemoryManager>,
    assembler: ContextAssembler,
    config: DialogueConfig,
}

impl DialogueManager {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        memory: Arc<MemoryManager>,
        knowledge: Arc<KnowledgeRetriever>,
    ) -> Self {
        Self {
            model,
            assembler: ContextAssembler::new(Arc::clone(&memory), knowledge),
            memory,
            config: DialogueConfig::default(),
        }
    }

    pub fn with_config(mut self, config: DialogueConfig) -> Self {
        self.assembler = self.assembler.with_config(config.clone());
        self.config = config;
        self
    }

    /// Open a session for the user.
    pub async fn start_session(&self, user_id: &str) -> Result<String> {
        self.memory.start_session(user_id).await
    }

    /// Close a session; summarization runs on a best-effort basis.
    pub async fn end_session(&self, user_id: &str, session_id: &str) -> Result<()> {
        self.memory.end_session(user_id, session_id).await
    }

    /// Run one turn: assemble the context, generate, persist the exchange.
    ///
    /// Memory and knowledge degrade silently during assembly; a generation
    /// failure is the one error that surfaces, since without it there is
    /// no reply.
    pub async fn chat(
        &self,
        user_id: &str,
        session_id: &str,
        user_message: &str,
        emotion: Option<EmotionMap>,
    ) -> Result<ChatReply> {
        let context = self
            .assembler
            .build_context(user_id, session_id, user_message)
            .await;
        debug!(
            user_id,
            session_id,
            tokens = context.metadata.total_tokens,
            history = context.metadata.history_included,
            "assembled context"
        );

        let request = ChatRequest::new(context.messages).with_temperature(self.config.temperature);
        let response = self.model.generate(request).await?;

        self.memory
            .add_turn(user_id, session_id, user_message, &response.text, emotion)
            .await?;

        Ok(ChatReply {
            text: response.text,
            usage: response.usage,
            metadata: context.metadata,
        })
    }
}
