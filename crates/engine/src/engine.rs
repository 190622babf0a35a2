//! Conversation state and the reply pipeline.
//!
//! A [`Conversation`] pairs a shared, immutable [`RuleSet`] with the small
//! amount of state that belongs to one dialogue: a cursor per rule (which
//! reassembly comes next) and the memory queue. Each turn runs
//!
//! ```text
//! Idle ─▶ Matching ─▶ Responding ─▶ Idle
//!           │  exact family?  ─────────────┐
//!           │  ranked keywords, in order   │
//!           │    first matching rule ──────┤
//!           │  none: memory, else default ─┤
//!           └─▶ feed memory candidate ◀────┘
//! ```
//!
//! Memory is fed after the reply is chosen, so a parked reply is never
//! spoken on the turn that produced it.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::matcher::match_pattern;
use crate::memory::{DEFAULT_MEMORY_CAPACITY, MemoryQueue};
use crate::model::{FAREWELL_FAMILY, KeywordHit, Reassembly, RuleSet, Template};
use crate::reassemble::reassemble;
use crate::tokenize::{is_separator, normalize};
use crate::{EngineError, RuleDefinitionError, RulePack};

/// Snapshot format version.
const SNAPSHOT_VERSION: u32 = 1;

/// Maximum chain of `goto` delegations followed in one turn.
const MAX_GOTO_DEPTH: usize = 8;

/// Default limit on normalized words per utterance.
pub const DEFAULT_MAX_UTTERANCE_WORDS: usize = 2_048;

/// Phase of a turn, reported in trace output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Matching,
    Responding,
}

/// Where a reply came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplySource {
    /// A whole-utterance family such as a greeting or farewell.
    Exact { family: String },
    /// A keyword rule (after following any gotos).
    Keyword { keyword: String, rule: usize },
    /// A reply parked by an earlier turn.
    Memory,
    /// One of the default prompts.
    Default,
}

/// The outcome of one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub reply: String,
    pub source: ReplySource,
}

impl Turn {
    /// Whether this reply closes the conversation.
    pub fn is_farewell(&self) -> bool {
        matches!(&self.source, ReplySource::Exact { family } if family.starts_with(FAREWELL_FAMILY))
    }
}

/// Round-robin positions, keyed by rule identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
struct Cursors(BTreeMap<String, usize>);

impl Cursors {
    /// Current slot for `key` among `len` choices; advances the cursor.
    fn advance(&mut self, key: String, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        let cursor = self.0.entry(key).or_insert(0);
        let slot = *cursor % len;
        *cursor = (slot + 1) % len;
        slot
    }
}

fn rule_key(keyword: &str, index: usize) -> String {
    format!("rule/{index}/{keyword}")
}

fn memory_key(keyword: &str, index: usize) -> String {
    format!("memory/{index}/{keyword}")
}

fn exact_key(family: &str) -> String {
    format!("exact/{family}")
}

const DEFAULT_KEY: &str = "default";
const INITIAL_KEY: &str = "initial";

/// Render a template that takes no captures.
fn render_plain(template: &Template, rules: &RuleSet) -> String {
    reassemble(template, &Vec::new(), rules.reflections())
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    catalog_digest: String,
    cursors: Cursors,
    memory: MemoryQueue,
    /// Present only when the conversation extended its rules privately.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    catalog: Option<RuleSet>,
}

/// One dialogue with the engine.
///
/// Cheap to create: the rule set is shared. Extending the rules gives this
/// conversation a private copy and leaves every other one untouched.
#[derive(Debug, Clone)]
pub struct Conversation {
    rules: Arc<RuleSet>,
    digest: String,
    extended: bool,
    cursors: Cursors,
    memory: MemoryQueue,
    max_words: usize,
}

impl Conversation {
    /// Start a conversation over a shared rule set.
    pub fn new(rules: Arc<RuleSet>) -> Self {
        let digest = rules.digest();
        Self {
            rules,
            digest,
            extended: false,
            cursors: Cursors::default(),
            memory: MemoryQueue::new(DEFAULT_MEMORY_CAPACITY),
            max_words: DEFAULT_MAX_UTTERANCE_WORDS,
        }
    }

    /// Set the memory queue capacity. Only meaningful before the first turn.
    pub fn with_memory_capacity(mut self, capacity: usize) -> Self {
        self.memory = MemoryQueue::new(capacity);
        self
    }

    /// Refuse utterances that normalize to more than `limit` words.
    pub fn with_max_words(mut self, limit: usize) -> Self {
        self.max_words = limit;
        self
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Digest of the rule set this conversation runs on.
    pub fn catalog_digest(&self) -> &str {
        &self.digest
    }

    /// Whether this conversation has privately extended rules.
    pub fn is_extended(&self) -> bool {
        self.extended
    }

    pub fn memory(&self) -> &MemoryQueue {
        &self.memory
    }

    /// The default prompts, rendered.
    pub fn default_prompts(&self) -> Vec<String> {
        self.rules
            .default_prompts()
            .iter()
            .map(|t| render_plain(t, &self.rules))
            .collect()
    }

    /// The next opening line, if the rule set has any.
    pub fn greeting(&mut self) -> Option<String> {
        let initials = self.rules.initials();
        if initials.is_empty() {
            return None;
        }
        let slot = self.cursors.advance(INITIAL_KEY.into(), initials.len());
        Some(initials[slot].clone())
    }

    /// Add keywords to this conversation only.
    ///
    /// New keywords win over existing ones with the same name. Existing
    /// cursors are kept. On error nothing changes.
    pub fn extend_rules(&mut self, pack: RulePack) -> Result<(), RuleDefinitionError> {
        let pack_name = pack.name.clone();
        let added = pack.keywords.len();
        let mut rules = (*self.rules).clone();
        rules.merge(pack)?;

        self.digest = rules.digest();
        self.rules = Arc::new(rules);
        self.extended = true;
        debug!(pack = %pack_name, keywords = added, "Conversation rules extended");
        Ok(())
    }

    /// Produce the reply to one utterance.
    pub fn respond(&mut self, utterance: &str) -> Result<String, EngineError> {
        self.turn(utterance).map(|t| t.reply)
    }

    /// Produce the reply to one utterance, reporting where it came from.
    pub fn turn(&mut self, utterance: &str) -> Result<Turn, EngineError> {
        if utterance.trim().is_empty() {
            return Err(EngineError::EmptyUtterance);
        }

        let rules = Arc::clone(&self.rules);
        trace!(state = ?TurnState::Matching, utterance, "Turn started");
        let tokens = normalize(utterance, &rules);
        if tokens.len() > self.max_words {
            return Err(EngineError::UtteranceTooLong {
                words: tokens.len(),
                limit: self.max_words,
            });
        }

        let phrase = tokens
            .iter()
            .filter(|t| !is_separator(t))
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ");
        if let Some(family) = rules.exact_family(&phrase) {
            let slot = self
                .cursors
                .advance(exact_key(&family.name), family.responses.len());
            let reply = render_plain(&family.responses[slot], &rules);
            debug!(family = %family.name, "Exact match");
            trace!(state = ?TurnState::Idle, "Turn finished");
            return Ok(Turn {
                reply,
                source: ReplySource::Exact {
                    family: family.name.clone(),
                },
            });
        }

        let hits = rules.all_keywords_in(&tokens);
        let mut turn = None;
        for hit in &hits {
            turn = self.try_keyword(&rules, &hit.keyword, &tokens, 0);
            if turn.is_some() {
                break;
            }
        }

        trace!(state = ?TurnState::Responding, hits = hits.len(), "Choosing reply");
        let turn = match turn {
            Some(t) => t,
            None => self.fallback(&rules),
        };

        self.remember(&rules, &tokens, &hits);
        debug!(source = ?turn.source, memory = self.memory.len(), "Reply chosen");
        trace!(state = ?TurnState::Idle, "Turn finished");
        Ok(turn)
    }

    /// Try `keyword`'s rules in order; the first whose pattern matches
    /// decides the turn (or delegates via goto).
    fn try_keyword(
        &mut self,
        rules: &RuleSet,
        keyword: &str,
        tokens: &[String],
        depth: usize,
    ) -> Option<Turn> {
        let entry = rules.lookup(keyword)?;
        let window = entry.scope.window(tokens, &entry.keyword);

        for (index, rule) in entry.rules.iter().enumerate() {
            let Some(captures) = match_pattern(&rule.pattern, window, rules.synonyms()) else {
                continue;
            };
            let slot = self
                .cursors
                .advance(rule_key(&entry.keyword, index), rule.reassemblies.len());

            return match &rule.reassemblies[slot] {
                Reassembly::Template(template) => Some(Turn {
                    reply: reassemble(template, &captures, rules.reflections()),
                    source: ReplySource::Keyword {
                        keyword: entry.keyword.clone(),
                        rule: index,
                    },
                }),
                Reassembly::Goto(target) if depth >= MAX_GOTO_DEPTH => {
                    warn!(keyword = %entry.keyword, target = %target, "Goto chain too deep, abandoning keyword");
                    None
                }
                Reassembly::Goto(target) => {
                    trace!(from = %entry.keyword, to = %target, "Goto");
                    self.try_keyword(rules, target, tokens, depth + 1)
                }
            };
        }
        None
    }

    /// No keyword produced a reply: oldest memory, else a default prompt.
    fn fallback(&mut self, rules: &RuleSet) -> Turn {
        if let Some(reply) = self.memory.drain() {
            return Turn {
                reply,
                source: ReplySource::Memory,
            };
        }
        let defaults = rules.default_prompts();
        let slot = self.cursors.advance(DEFAULT_KEY.into(), defaults.len());
        let reply = defaults
            .get(slot)
            .map(|t| render_plain(t, rules))
            .unwrap_or_default();
        Turn {
            reply,
            source: ReplySource::Default,
        }
    }

    /// Park at most one memory reply from this turn's keywords.
    fn remember(&mut self, rules: &RuleSet, tokens: &[String], hits: &[KeywordHit]) {
        for hit in hits {
            let Some(entry) = rules.lookup(&hit.keyword) else {
                continue;
            };
            let window = entry.scope.window(tokens, &entry.keyword);
            for (index, rule) in entry.memory_rules.iter().enumerate() {
                let Some(captures) = match_pattern(&rule.pattern, window, rules.synonyms()) else {
                    continue;
                };
                let slot = self
                    .cursors
                    .advance(memory_key(&entry.keyword, index), rule.reassemblies.len());
                if let Reassembly::Template(template) = &rule.reassemblies[slot] {
                    let candidate = reassemble(template, &captures, rules.reflections());
                    if self.memory.feed(candidate) {
                        debug!(keyword = %entry.keyword, queued = self.memory.len(), "Memory stored");
                    } else {
                        debug!(keyword = %entry.keyword, "Memory full, candidate dropped");
                    }
                }
                return;
            }
        }
    }

    // ── Persistence ─────────────────────────────────────────────────────

    /// Serialize the per-conversation state.
    ///
    /// The shared rule set is referenced by digest; a privately extended
    /// one is embedded.
    pub fn to_bytes(&self) -> Result<Vec<u8>, EngineError> {
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            catalog_digest: self.digest.clone(),
            cursors: self.cursors.clone(),
            memory: self.memory.clone(),
            catalog: self.extended.then(|| (*self.rules).clone()),
        };
        serde_json::to_vec(&snapshot).map_err(|e| EngineError::Snapshot(e.to_string()))
    }

    /// Restore a conversation written by [`to_bytes`](Self::to_bytes).
    ///
    /// Fails if the snapshot was taken against a different shared rule set.
    pub fn from_bytes(bytes: &[u8], rules: Arc<RuleSet>) -> Result<Self, EngineError> {
        let snapshot: Snapshot =
            serde_json::from_slice(bytes).map_err(|e| EngineError::Snapshot(e.to_string()))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(EngineError::Snapshot(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }

        let (rules, extended) = match snapshot.catalog {
            Some(own) => (Arc::new(own), true),
            None => (rules, false),
        };
        let digest = rules.digest();
        if digest != snapshot.catalog_digest {
            return Err(EngineError::Snapshot(
                "rule set does not match the one the snapshot was taken with".into(),
            ));
        }
        if extended {
            rules.validate()?;
        }

        Ok(Self {
            rules,
            digest,
            extended,
            cursors: snapshot.cursors,
            memory: snapshot.memory,
            max_words: DEFAULT_MAX_UTTERANCE_WORDS,
        })
    }
}
