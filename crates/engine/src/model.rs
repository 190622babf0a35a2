//! Rule data model: keywords, decomposition patterns and reassembly templates.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::RuleDefinitionError;
use crate::reassemble::default_reflections;

/// Name given to the exact family built from a script's `quit:` words.
pub const FAREWELL_FAMILY: &str = "farewell";

/// Default rank for a keyword that does not specify one.
pub const DEFAULT_RANK: i32 = 1;

/// Prompts used when a rule set carries no defaults of its own.
const BUILTIN_DEFAULT_PROMPTS: &[&str] = &[
    "Please go on.",
    "Tell me more.",
    "I see.",
    "Very interesting.",
];

/// One token of a decomposition pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PatternToken {
    /// Matches exactly this word (case-insensitively).
    Literal(String),
    /// Matches zero or more words and captures them.
    Wildcard,
    /// Matches one word from the named synonym group and captures it.
    Synonym(String),
}

impl PatternToken {
    /// Whether matching this token produces a capture.
    pub fn captures(&self) -> bool {
        !matches!(self, PatternToken::Literal(_))
    }
}

impl From<String> for PatternToken {
    fn from(s: String) -> Self {
        if s == "*" {
            PatternToken::Wildcard
        } else if let Some(root) = s.strip_prefix('@').filter(|r| !r.is_empty()) {
            PatternToken::Synonym(root.to_lowercase())
        } else {
            PatternToken::Literal(s.to_lowercase())
        }
    }
}

impl From<PatternToken> for String {
    fn from(t: PatternToken) -> Self {
        match t {
            PatternToken::Literal(w) => w,
            PatternToken::Wildcard => "*".into(),
            PatternToken::Synonym(root) => format!("@{root}"),
        }
    }
}

/// Parse a whitespace-separated pattern such as `* i @desire *`.
pub fn parse_pattern(text: &str) -> Vec<PatternToken> {
    text.split_whitespace()
        .map(|w| PatternToken::from(w.to_string()))
        .collect()
}

/// A piece of a reassembly template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Text copied verbatim into the reply.
    Text(String),
    /// The capture with this zero-based index, pronoun-inverted.
    Capture(usize),
}

/// A reassembly template: literal text interleaved with capture placeholders.
///
/// Two source notations are accepted. Classic scripts number captures from
/// one inside parentheses (`Why do you say (2) ?`); rule packs number them
/// from zero inside braces (`为什么你会{0}？`). Serialized form is the brace
/// notation with a literal `{` doubled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// A template with no placeholders.
    pub fn literal(text: impl Into<String>) -> Self {
        Self {
            segments: vec![Segment::Text(text.into())],
        }
    }

    /// Parse classic `(n)` notation, one-based.
    pub fn parse_classic(text: &str) -> Result<Self, RuleDefinitionError> {
        Self::parse_placeholders(text, '(', ')', true)
    }

    /// Parse rule-pack `{n}` notation, zero-based.
    pub fn parse_braced(text: &str) -> Result<Self, RuleDefinitionError> {
        Self::parse_placeholders(text, '{', '}', false)
    }

    fn parse_placeholders(
        text: &str,
        open: char,
        close: char,
        one_based: bool,
    ) -> Result<Self, RuleDefinitionError> {
        let invalid = |reason: String| RuleDefinitionError::InvalidTemplate {
            template: text.to_string(),
            reason,
        };

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = text.char_indices().peekable();

        while let Some((i, c)) = chars.next() {
            if c != open {
                literal.push(c);
                continue;
            }
            // `{{` is an escaped brace
            if !one_based && chars.peek().map(|&(_, n)| n) == Some(open) {
                chars.next();
                literal.push(open);
                continue;
            }
            let rest = &text[i + c.len_utf8()..];
            let digits = rest
                .find(close)
                .map(|end| &rest[..end])
                .filter(|d| !d.is_empty() && d.chars().all(|ch| ch.is_ascii_digit()));
            let Some(digits) = digits else {
                literal.push(c);
                continue;
            };

            let n: usize = digits
                .parse()
                .map_err(|_| invalid(format!("placeholder '{digits}' is out of range")))?;
            let index = if one_based {
                n.checked_sub(1)
                    .ok_or_else(|| invalid("captures are numbered from 1".into()))?
            } else {
                n
            };

            if !literal.is_empty() {
                segments.push(Segment::Text(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Capture(index));
            // digits are ASCII, so byte length == char count; +1 for the closer
            for _ in 0..=digits.len() {
                chars.next();
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Text(literal));
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Highest capture index referenced, if any.
    pub fn max_capture(&self) -> Option<usize> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Capture(i) => Some(*i),
                Segment::Text(_) => None,
            })
            .max()
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            match segment {
                Segment::Text(t) => f.write_str(&t.replace('{', "{{"))?,
                Segment::Capture(i) => write!(f, "{{{i}}}")?,
            }
        }
        Ok(())
    }
}

impl TryFrom<String> for Template {
    type Error = RuleDefinitionError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse_braced(&s)
    }
}

impl From<Template> for String {
    fn from(t: Template) -> Self {
        t.to_string()
    }
}

/// What a decomposition rule produces when it is selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reassembly {
    /// Fill in this template.
    Template(Template),
    /// Re-run matching with another keyword's rules.
    Goto(String),
}

impl fmt::Display for Reassembly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reassembly::Template(t) => t.fmt(f),
            Reassembly::Goto(target) => write!(f, "goto {target}"),
        }
    }
}

/// A decomposition pattern with its ordered reassemblies.
///
/// Which reassembly comes next is conversation state, not part of the rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub pattern: Vec<PatternToken>,
    pub reassemblies: Vec<Reassembly>,
}

impl Rule {
    pub fn new(pattern: Vec<PatternToken>, reassemblies: Vec<Reassembly>) -> Self {
        Self {
            pattern,
            reassemblies,
        }
    }

    /// Number of captures a successful match yields.
    pub fn capture_count(&self) -> usize {
        self.pattern.iter().filter(|t| t.captures()).count()
    }
}

/// Which part of the normalized utterance a keyword's patterns see.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchScope {
    /// The whole utterance.
    #[default]
    Utterance,
    /// Only the words after the keyword's first occurrence.
    AfterKeyword,
}

impl MatchScope {
    /// The slice of `tokens` this scope exposes to `keyword`'s patterns.
    pub fn window<'a>(&self, tokens: &'a [String], keyword: &str) -> &'a [String] {
        match self {
            MatchScope::Utterance => tokens,
            MatchScope::AfterKeyword => tokens
                .iter()
                .position(|t| t == keyword)
                .map_or(tokens, |pos| &tokens[pos + 1..]),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchScope::Utterance => "utterance",
            MatchScope::AfterKeyword => "after_keyword",
        }
    }
}

/// A keyword with its rank and rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordEntry {
    pub keyword: String,

    /// Higher ranks are tried first.
    pub rank: i32,

    #[serde(default)]
    pub scope: MatchScope,

    /// Rules tried in order when the keyword fires.
    pub rules: Vec<Rule>,

    /// Rules that produce deferred replies for the memory queue.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub memory_rules: Vec<Rule>,
}

impl KeywordEntry {
    pub fn new(keyword: impl Into<String>, rank: i32) -> Self {
        Self {
            keyword: keyword.into().to_lowercase(),
            rank,
            scope: MatchScope::Utterance,
            rules: Vec::new(),
            memory_rules: Vec::new(),
        }
    }

    /// A keyword whose templates echo whatever follows it.
    ///
    /// Templates use `{n}` notation; `{0}` is the remainder after the keyword.
    pub fn with_templates(
        keyword: impl Into<String>,
        rank: i32,
        templates: &[&str],
    ) -> Result<Self, RuleDefinitionError> {
        let reassemblies = templates
            .iter()
            .map(|t| Template::parse_braced(t).map(Reassembly::Template))
            .collect::<Result<Vec<_>, _>>()?;
        let mut entry = Self::new(keyword, rank);
        entry.scope = MatchScope::AfterKeyword;
        entry
            .rules
            .push(Rule::new(vec![PatternToken::Wildcard], reassemblies));
        Ok(entry)
    }
}

/// A family of whole-utterance matches (greetings, farewells) answered
/// round-robin from its responses, ahead of keyword matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExactFamily {
    pub name: String,
    pub words: Vec<String>,
    pub responses: Vec<Template>,
}

/// A keyword found in an utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordHit {
    pub keyword: String,
    pub rank: i32,
    /// Token index of the first occurrence.
    pub position: usize,
}

/// An immutable catalog of keywords and substitution tables.
///
/// Built once (from the classic script and any rule packs) and shared by
/// every conversation behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    keywords: BTreeMap<String, KeywordEntry>,

    /// Synonym groups keyed by root; each group includes its root.
    synonyms: BTreeMap<String, Vec<String>>,

    /// Input substitutions applied before matching.
    pre: BTreeMap<String, Vec<String>>,

    /// Pronoun inversions applied to captured text.
    reflections: BTreeMap<String, Vec<String>>,

    /// Prompts used when no keyword fires and memory is empty.
    defaults: Vec<Template>,

    /// Opening lines.
    initials: Vec<String>,

    exact: Vec<ExactFamily>,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleSet {
    /// An empty rule set with the standard reflections and default prompts.
    pub fn new() -> Self {
        Self {
            keywords: BTreeMap::new(),
            synonyms: BTreeMap::new(),
            pre: BTreeMap::new(),
            reflections: default_reflections(),
            defaults: BUILTIN_DEFAULT_PROMPTS
                .iter()
                .map(|p| Template::literal(*p))
                .collect(),
            initials: Vec::new(),
            exact: Vec::new(),
        }
    }

    // ── Lookup ──────────────────────────────────────────────────────────

    pub fn lookup(&self, keyword: &str) -> Option<&KeywordEntry> {
        self.keywords
            .get(keyword)
            .or_else(|| self.keywords.get(&keyword.to_lowercase()))
    }

    pub fn keywords(&self) -> impl Iterator<Item = &KeywordEntry> {
        self.keywords.values()
    }

    pub fn keyword_count(&self) -> usize {
        self.keywords.len()
    }

    pub fn synonyms(&self) -> &BTreeMap<String, Vec<String>> {
        &self.synonyms
    }

    pub fn pre_substitutions(&self) -> &BTreeMap<String, Vec<String>> {
        &self.pre
    }

    pub fn reflections(&self) -> &BTreeMap<String, Vec<String>> {
        &self.reflections
    }

    pub fn default_prompts(&self) -> &[Template] {
        &self.defaults
    }

    pub fn initials(&self) -> &[String] {
        &self.initials
    }

    pub fn exact_families(&self) -> &[ExactFamily] {
        &self.exact
    }

    /// The exact family whose words include `phrase`, if any.
    pub fn exact_family(&self, phrase: &str) -> Option<&ExactFamily> {
        self.exact
            .iter()
            .find(|f| f.words.iter().any(|w| w == phrase))
    }

    /// Every distinct keyword present in `tokens`, best first: descending
    /// rank, then earliest position.
    pub fn all_keywords_in(&self, tokens: &[String]) -> Vec<KeywordHit> {
        let mut hits: Vec<KeywordHit> = Vec::new();
        for (position, token) in tokens.iter().enumerate() {
            let Some(entry) = self.keywords.get(token) else {
                continue;
            };
            if hits.iter().any(|h| h.keyword == entry.keyword) {
                continue;
            }
            hits.push(KeywordHit {
                keyword: entry.keyword.clone(),
                rank: entry.rank,
                position,
            });
        }
        hits.sort_by(|a, b| b.rank.cmp(&a.rank).then(a.position.cmp(&b.position)));
        hits
    }

    /// Words that must survive segmentation of unspaced scripts intact.
    pub(crate) fn lexicon(&self) -> impl Iterator<Item = &str> {
        self.keywords
            .keys()
            .chain(self.synonyms.values().flatten())
            .chain(self.pre.keys())
            .chain(self.reflections.keys())
            .chain(self.exact.iter().flat_map(|f| f.words.iter()))
            .map(String::as_str)
    }

    // ── Mutation (load time only) ───────────────────────────────────────

    /// Register a keyword, replacing any existing entry with the same name.
    pub fn register(&mut self, mut entry: KeywordEntry) -> Option<KeywordEntry> {
        entry.keyword = entry.keyword.to_lowercase();
        self.keywords.insert(entry.keyword.clone(), entry)
    }

    pub(crate) fn add_synonyms(&mut self, root: String, mut group: Vec<String>) {
        if !group.contains(&root) {
            group.insert(0, root.clone());
        }
        self.synonyms.insert(root, group);
    }

    pub(crate) fn add_pre(&mut self, from: String, to: Vec<String>) {
        self.pre.insert(from, to);
    }

    pub(crate) fn add_reflection(&mut self, from: String, to: Vec<String>) {
        self.reflections.insert(from, to);
    }

    pub(crate) fn add_initial(&mut self, line: String) {
        self.initials.push(line);
    }

    pub(crate) fn set_default_prompts(&mut self, prompts: Vec<Template>) {
        self.defaults = prompts;
    }

    /// Add an exact family, replacing one with the same name.
    pub fn add_exact_family(&mut self, family: ExactFamily) {
        let family = ExactFamily {
            words: family.words.iter().map(|w| w.to_lowercase()).collect(),
            ..family
        };
        match self.exact.iter_mut().find(|f| f.name == family.name) {
            Some(existing) => *existing = family,
            None => self.exact.push(family),
        }
    }

    /// Fold a rule pack into this set and re-validate the result.
    ///
    /// A pack keyword that already exists replaces the old entry.
    pub fn merge(&mut self, pack: crate::RulePack) -> Result<(), RuleDefinitionError> {
        let crate::RulePack {
            name,
            keywords,
            synonyms,
            pre,
            reflections,
            exact,
        } = pack;

        for entry in keywords {
            if let Some(previous) = self.register(entry) {
                debug!(pack = %name, keyword = %previous.keyword, "Keyword replaced by rule pack");
            }
        }
        for (root, group) in synonyms {
            self.add_synonyms(root, group);
        }
        self.pre.extend(pre);
        self.reflections.extend(reflections);
        for family in exact {
            self.add_exact_family(family);
        }
        self.validate()
    }

    // ── Validation ──────────────────────────────────────────────────────

    /// Reject definitions that could misbehave at reply time.
    pub fn validate(&self) -> Result<(), RuleDefinitionError> {
        for entry in self.keywords.values() {
            if entry.rules.is_empty() && entry.memory_rules.is_empty() {
                return Err(RuleDefinitionError::NoRules {
                    keyword: entry.keyword.clone(),
                });
            }
            for (index, rule) in entry.rules.iter().enumerate() {
                self.validate_rule(&entry.keyword, index, rule, false)?;
            }
            for (index, rule) in entry.memory_rules.iter().enumerate() {
                self.validate_rule(&entry.keyword, index, rule, true)?;
            }
        }

        if self.defaults.is_empty() {
            return Err(RuleDefinitionError::InvalidDefaults(
                "at least one default prompt is required".into(),
            ));
        }
        if self.defaults.iter().any(|t| t.max_capture().is_some()) {
            return Err(RuleDefinitionError::InvalidDefaults(
                "default prompts cannot reference captures".into(),
            ));
        }

        for family in &self.exact {
            let reason = if family.words.is_empty() {
                Some("no words")
            } else if family.responses.is_empty() {
                Some("no responses")
            } else if family.responses.iter().any(|t| t.max_capture().is_some()) {
                Some("responses cannot reference captures")
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(RuleDefinitionError::InvalidFamily {
                    name: family.name.clone(),
                    reason: reason.into(),
                });
            }
        }
        Ok(())
    }

    fn validate_rule(
        &self,
        keyword: &str,
        index: usize,
        rule: &Rule,
        memory: bool,
    ) -> Result<(), RuleDefinitionError> {
        if rule.reassemblies.is_empty() {
            return Err(RuleDefinitionError::EmptyTemplates {
                keyword: keyword.into(),
                rule: index,
            });
        }
        for token in &rule.pattern {
            if let PatternToken::Synonym(root) = token {
                if !self.synonyms.contains_key(root) {
                    return Err(RuleDefinitionError::UnknownSynonym {
                        keyword: keyword.into(),
                        root: root.clone(),
                    });
                }
            }
        }

        let available = rule.capture_count();
        for reassembly in &rule.reassemblies {
            match reassembly {
                Reassembly::Template(t) => {
                    if let Some(max) = t.max_capture().filter(|&m| m >= available) {
                        return Err(RuleDefinitionError::PlaceholderOutOfRange {
                            keyword: keyword.into(),
                            rule: index,
                            index: max,
                            available,
                        });
                    }
                }
                Reassembly::Goto(_) if memory => {
                    return Err(RuleDefinitionError::GotoInMemoryRule {
                        keyword: keyword.into(),
                    });
                }
                Reassembly::Goto(target) => {
                    if !self.keywords.contains_key(target) {
                        return Err(RuleDefinitionError::UnknownGoto {
                            keyword: keyword.into(),
                            target: target.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    // ── Identity ────────────────────────────────────────────────────────

    /// SHA-256 over a canonical rendering of the whole catalog, hex encoded.
    ///
    /// Two sets built from the same definitions always share a digest.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        let mut put = |field: &str| {
            hasher.update(field.as_bytes());
            hasher.update([0u8]);
        };

        for entry in self.keywords.values() {
            put("key");
            put(&entry.keyword);
            put(&entry.rank.to_string());
            put(entry.scope.as_str());
            for (tag, rules) in [("rule", &entry.rules), ("memory", &entry.memory_rules)] {
                for rule in rules {
                    put(tag);
                    for token in &rule.pattern {
                        put(&String::from(token.clone()));
                    }
                    for reassembly in &rule.reassemblies {
                        put(&reassembly.to_string());
                    }
                }
            }
        }
        for (tag, table) in [
            ("synon", &self.synonyms),
            ("pre", &self.pre),
            ("post", &self.reflections),
        ] {
            for (from, to) in table {
                put(tag);
                put(from);
                put(&to.join(" "));
            }
        }
        for prompt in &self.defaults {
            put("default");
            put(&prompt.to_string());
        }
        for line in &self.initials {
            put("initial");
            put(line);
        }
        for family in &self.exact {
            put("exact");
            put(&family.name);
            put(&family.words.join(" "));
            for response in &family.responses {
                put(&response.to_string());
            }
        }

        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn pattern_tokens_from_string() {
        assert_eq!(PatternToken::from("*".to_string()), PatternToken::Wildcard);
        assert_eq!(
            PatternToken::from("@Desire".to_string()),
            PatternToken::Synonym("desire".into())
        );
        assert_eq!(
            PatternToken::from("Remember".to_string()),
            PatternToken::Literal("remember".into())
        );
        // a bare @ is just a word
        assert_eq!(
            PatternToken::from("@".to_string()),
            PatternToken::Literal("@".into())
        );
    }

    #[test]
    fn classic_template_is_one_based() {
        let t = Template::parse_classic("Why do you say (2) ?").unwrap();
        assert_eq!(t.max_capture(), Some(1));
        assert_eq!(t.to_string(), "Why do you say {1} ?");
        assert!(Template::parse_classic("bad (0)").is_err());
    }

    #[test]
    fn braced_template_is_zero_based() {
        let t = Template::parse_braced("为什么你会{0}？").unwrap();
        assert_eq!(
            t.segments(),
            &[
                Segment::Text("为什么你会".into()),
                Segment::Capture(0),
                Segment::Text("？".into())
            ]
        );
    }

    #[test]
    fn non_numeric_brackets_stay_literal() {
        let t = Template::parse_classic("(smiles) go on").unwrap();
        assert_eq!(t.max_capture(), None);
        let t = Template::parse_braced("a {b} c").unwrap();
        assert_eq!(t.segments(), &[Segment::Text("a {b} c".into())]);
    }

    #[test]
    fn template_serialization_preserves_literal_braces() {
        let t = Template::literal("set {0} aside");
        let json = serde_json::to_string(&t).unwrap();
        let back: Template = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
        assert_eq!(back.max_capture(), None);
    }

    #[test]
    fn scope_window_after_keyword() {
        let tokens = words("我感觉 很 难过");
        assert_eq!(
            MatchScope::AfterKeyword.window(&tokens, "我感觉"),
            &words("很 难过")[..]
        );
        assert_eq!(MatchScope::Utterance.window(&tokens, "我感觉"), &tokens[..]);
        // keyword absent (reached by goto): whole utterance
        assert_eq!(MatchScope::AfterKeyword.window(&tokens, "你"), &tokens[..]);
    }

    #[test]
    fn keywords_ordered_by_rank_then_position() {
        let mut set = RuleSet::new();
        set.register(KeywordEntry::with_templates("alpha", 1, &["a"]).unwrap());
        set.register(KeywordEntry::with_templates("beta", 1, &["b"]).unwrap());
        set.register(KeywordEntry::with_templates("gamma", 5, &["g"]).unwrap());

        let hits = set.all_keywords_in(&words("beta alpha gamma beta"));
        let order: Vec<_> = hits.iter().map(|h| h.keyword.as_str()).collect();
        assert_eq!(order, vec!["gamma", "beta", "alpha"]);
        assert_eq!(hits[1].position, 0);
    }

    #[test]
    fn register_replaces_existing_keyword() {
        let mut set = RuleSet::new();
        assert!(set.register(KeywordEntry::with_templates("x", 1, &["one"]).unwrap()).is_none());
        let previous = set.register(KeywordEntry::with_templates("X", 3, &["two"]).unwrap());
        assert!(previous.is_some());
        assert_eq!(set.lookup("x").unwrap().rank, 3);
        assert_eq!(set.keyword_count(), 1);
    }

    #[test]
    fn validate_rejects_out_of_range_placeholder() {
        let mut set = RuleSet::new();
        set.register(KeywordEntry::with_templates("x", 1, &["{1}"]).unwrap());
        assert!(matches!(
            set.validate(),
            Err(RuleDefinitionError::PlaceholderOutOfRange { index: 1, available: 1, .. })
        ));
    }

    #[test]
    fn validate_rejects_unknown_goto_and_synonym() {
        let mut set = RuleSet::new();
        let mut entry = KeywordEntry::new("x", 1);
        entry.rules.push(Rule::new(
            vec![PatternToken::Wildcard],
            vec![Reassembly::Goto("nowhere".into())],
        ));
        set.register(entry);
        assert!(matches!(
            set.validate(),
            Err(RuleDefinitionError::UnknownGoto { .. })
        ));

        let mut set = RuleSet::new();
        let mut entry = KeywordEntry::new("y", 1);
        entry.rules.push(Rule::new(
            parse_pattern("* @mood *"),
            vec![Reassembly::Template(Template::literal("hm"))],
        ));
        set.register(entry);
        assert!(matches!(
            set.validate(),
            Err(RuleDefinitionError::UnknownSynonym { .. })
        ));
    }

    #[test]
    fn validate_rejects_empty_templates() {
        let mut set = RuleSet::new();
        let mut entry = KeywordEntry::new("x", 1);
        entry.rules.push(Rule::new(vec![PatternToken::Wildcard], vec![]));
        set.register(entry);
        assert!(matches!(
            set.validate(),
            Err(RuleDefinitionError::EmptyTemplates { .. })
        ));
    }

    #[test]
    fn digest_is_stable_and_content_sensitive() {
        let build = || {
            let mut set = RuleSet::new();
            set.register(KeywordEntry::with_templates("x", 1, &["a {0}"]).unwrap());
            set
        };
        assert_eq!(build().digest(), build().digest());

        let mut other = build();
        other.register(KeywordEntry::with_templates("y", 1, &["b"]).unwrap());
        assert_ne!(build().digest(), other.digest());
    }
}
