//! Keyword-ranked decomposition/reassembly engine.
//!
//! A [`RuleSet`] is a catalog of keywords. Each keyword has a rank and an
//! ordered list of decomposition patterns, and each pattern has a rotating
//! list of reassembly templates. A [`Conversation`] answers utterances
//! against a shared rule set and keeps the per-dialogue state (template
//! cursors and deferred "memory" replies) that makes replies vary.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐   ┌───────────┐   ┌──────────────┐   ┌──────────────┐
//! │ utterance  │──▶│ normalize │──▶│ rank keywords│──▶│ match pattern│
//! └────────────┘   └───────────┘   └──────────────┘   └──────┬───────┘
//!                                                            │
//!                         ┌──────────────┐   ┌───────────────▼───┐
//!                         │ memory queue │◀──│ reassemble + invert│
//!                         └──────────────┘   └───────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use eliza_engine::{Conversation, RulePack, RuleSet};
//!
//! let mut rules = RuleSet::doctor().unwrap();
//! rules.merge(RulePack::chinese().unwrap()).unwrap();
//!
//! let mut conversation = Conversation::new(Arc::new(rules));
//! assert_eq!(conversation.respond("我感觉难过").unwrap(), "为什么你会难过？");
//! ```

mod engine;
mod matcher;
mod memory;
mod model;
mod pack;
mod reassemble;
mod script;
mod tokenize;

pub use engine::{Conversation, DEFAULT_MAX_UTTERANCE_WORDS, ReplySource, Turn, TurnState};
pub use matcher::{Captures, match_pattern};
pub use memory::{DEFAULT_MEMORY_CAPACITY, MemoryQueue};
pub use model::{
    DEFAULT_RANK, ExactFamily, FAREWELL_FAMILY, KeywordEntry, KeywordHit, MatchScope,
    PatternToken, Reassembly, Rule, RuleSet, Segment, Template, parse_pattern,
};
pub use pack::RulePack;
pub use reassemble::{default_reflections, reassemble, reflect};
pub use tokenize::normalize;

/// Result alias for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// A rule definition that cannot be loaded.
#[derive(Debug, thiserror::Error)]
pub enum RuleDefinitionError {
    #[error("line {line}: {reason}")]
    Syntax { line: usize, reason: String },

    #[error("keyword '{keyword}' has no rules")]
    NoRules { keyword: String },

    #[error("keyword '{keyword}', rule {rule}: no reassembly templates")]
    EmptyTemplates { keyword: String, rule: usize },

    #[error(
        "keyword '{keyword}', rule {rule}: template uses capture {index} but the pattern yields {available}"
    )]
    PlaceholderOutOfRange {
        keyword: String,
        rule: usize,
        index: usize,
        available: usize,
    },

    #[error("keyword '{keyword}': goto target '{target}' is not a registered keyword")]
    UnknownGoto { keyword: String, target: String },

    #[error("keyword '{keyword}': memory rules cannot use goto")]
    GotoInMemoryRule { keyword: String },

    #[error("keyword '{keyword}': unknown synonym group '@{root}'")]
    UnknownSynonym { keyword: String, root: String },

    #[error("invalid template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },

    #[error("exact family '{name}': {reason}")]
    InvalidFamily { name: String, reason: String },

    #[error("default prompts: {0}")]
    InvalidDefaults(String),

    #[error("rule file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Errors from answering or restoring a conversation.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("utterance is empty")]
    EmptyUtterance,

    #[error("utterance has {words} words, limit is {limit}")]
    UtteranceTooLong { words: usize, limit: usize },

    #[error("snapshot rejected: {0}")]
    Snapshot(String),

    #[error(transparent)]
    Rules(#[from] RuleDefinitionError),
}
