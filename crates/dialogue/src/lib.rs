//! # Attune Dialogue
//!
//! Budget-bounded context assembly and turn orchestration. Memory and
//! knowledge are woven into the system message, recent turns of the
//! current session fill the remaining token budget, and the exchange is
//! persisted after generation.

pub mod assembler;
pub mod manager;
pub mod token;

pub use assembler::{AssembledContext, ContextAssembler, ContextMetadata};
pub use manager::{ChatReply, DialogueManager};
pub use token::{HeuristicTokenCounter, ModelTokenCounter, estimate_tokens};
