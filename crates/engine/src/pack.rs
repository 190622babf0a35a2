//! Rule packs: TOML-defined keyword sets merged into a base rule set.
//!
//! ```toml
//! name = "zh"
//!
//! [reflections]
//! "我" = "你"
//!
//! [[keywords]]
//! keyword = "我感觉"
//! rank = 5
//! templates = ["为什么你会{0}？", "从什么时候开始你{0}？"]
//!
//! [[keywords]]
//! keyword = "mother"
//! rank = 3
//! [[keywords.rules]]
//! pattern = "* my mother *"
//! templates = ["Tell me more about your mother.", "goto family"]
//!
//! [[exact]]
//! name = "zh-greeting"
//! words = ["你好"]
//! responses = ["你好！有什么我可以帮助你的吗？"]
//! ```
//!
//! A keyword with a bare `templates` list matches anything after the
//! keyword (`{0}` is that remainder). Explicit `rules` match the whole
//! utterance unless `scope = "after_keyword"` is given. Pack templates use
//! zero-based `{n}` placeholders; `goto <key>` delegates.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::RuleDefinitionError;
use crate::model::{
    DEFAULT_RANK, ExactFamily, KeywordEntry, MatchScope, PatternToken, Reassembly, Rule, Template,
    parse_pattern,
};

/// The bundled Chinese pack.
const CHINESE_PACK: &str = include_str!("../data/zh.toml");

/// A parsed rule pack, ready to merge into a [`RuleSet`](crate::RuleSet).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RulePack {
    pub name: String,
    pub keywords: Vec<KeywordEntry>,
    pub synonyms: BTreeMap<String, Vec<String>>,
    pub pre: BTreeMap<String, Vec<String>>,
    pub reflections: BTreeMap<String, Vec<String>>,
    pub exact: Vec<ExactFamily>,
}

#[derive(Debug, Deserialize)]
struct RawPack {
    #[serde(default)]
    name: String,
    #[serde(default)]
    reflections: BTreeMap<String, String>,
    #[serde(default)]
    pre: BTreeMap<String, String>,
    #[serde(default)]
    synonyms: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    keywords: Vec<RawKeyword>,
    #[serde(default)]
    exact: Vec<RawExact>,
}

#[derive(Debug, Deserialize)]
struct RawKeyword {
    keyword: String,
    #[serde(default = "default_rank")]
    rank: i32,
    #[serde(default)]
    scope: Option<MatchScope>,
    #[serde(default)]
    templates: Vec<String>,
    #[serde(default)]
    rules: Vec<RawRule>,
}

#[derive(Debug, Deserialize)]
struct RawRule {
    #[serde(default = "default_pattern")]
    pattern: String,
    templates: Vec<String>,
    #[serde(default)]
    memory: bool,
}

#[derive(Debug, Deserialize)]
struct RawExact {
    name: String,
    words: Vec<String>,
    responses: Vec<String>,
}

fn default_rank() -> i32 {
    DEFAULT_RANK
}

fn default_pattern() -> String {
    "*".into()
}

fn split_words(s: &str) -> Vec<String> {
    s.split_whitespace().map(str::to_lowercase).collect()
}

fn parse_reassemblies(templates: &[String]) -> Result<Vec<Reassembly>, RuleDefinitionError> {
    templates
        .iter()
        .map(|t| match t.strip_prefix("goto ") {
            Some(target) => Ok(Reassembly::Goto(target.trim().to_lowercase())),
            None => Template::parse_braced(t).map(Reassembly::Template),
        })
        .collect()
}

impl RulePack {
    /// The bundled Chinese pack.
    pub fn chinese() -> Result<Self, RuleDefinitionError> {
        Self::from_toml(CHINESE_PACK)
    }

    /// Load a pack from disk.
    pub fn from_file(path: &Path) -> Result<Self, RuleDefinitionError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Parse a pack from a TOML string.
    ///
    /// Cross-references (goto targets, synonym roots) are checked when the
    /// pack is merged, since they may point into the base set.
    pub fn from_toml(toml_str: &str) -> Result<Self, RuleDefinitionError> {
        let raw: RawPack = toml::from_str(toml_str)?;

        let mut keywords = Vec::with_capacity(raw.keywords.len());
        for k in raw.keywords {
            let mut entry = KeywordEntry::new(&k.keyword, k.rank);
            if !k.templates.is_empty() {
                entry.scope = MatchScope::AfterKeyword;
                entry.rules.push(Rule::new(
                    vec![PatternToken::Wildcard],
                    parse_reassemblies(&k.templates)?,
                ));
            }
            for r in &k.rules {
                let rule = Rule::new(parse_pattern(&r.pattern), parse_reassemblies(&r.templates)?);
                if r.memory {
                    entry.memory_rules.push(rule);
                } else {
                    entry.rules.push(rule);
                }
            }
            if let Some(scope) = k.scope {
                entry.scope = scope;
            }
            if entry.rules.is_empty() && entry.memory_rules.is_empty() {
                return Err(RuleDefinitionError::NoRules {
                    keyword: entry.keyword,
                });
            }
            keywords.push(entry);
        }

        let exact = raw
            .exact
            .into_iter()
            .map(|e| {
                let responses = e
                    .responses
                    .iter()
                    .map(|r| Template::parse_braced(r))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ExactFamily {
                    name: e.name,
                    words: e.words.iter().map(|w| w.to_lowercase()).collect(),
                    responses,
                })
            })
            .collect::<Result<Vec<_>, RuleDefinitionError>>()?;

        Ok(Self {
            name: raw.name,
            keywords,
            synonyms: raw
                .synonyms
                .into_iter()
                .map(|(root, group)| {
                    (
                        root.to_lowercase(),
                        group.iter().map(|w| w.to_lowercase()).collect(),
                    )
                })
                .collect(),
            pre: raw
                .pre
                .into_iter()
                .map(|(from, to)| (from.to_lowercase(), split_words(&to)))
                .collect(),
            reflections: raw
                .reflections
                .into_iter()
                .map(|(from, to)| (from.to_lowercase(), split_words(&to)))
                .collect(),
            exact,
        })
    }

    /// Build a pack from `(keyword, rank, templates)` triples, each keyword
    /// echoing whatever follows it.
    pub fn from_templates(
        name: impl Into<String>,
        entries: &[(&str, i32, &[&str])],
    ) -> Result<Self, RuleDefinitionError> {
        let keywords = entries
            .iter()
            .map(|(keyword, rank, templates)| KeywordEntry::with_templates(*keyword, *rank, templates))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            name: name.into(),
            keywords,
            ..Self::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RuleSet;

    #[test]
    fn shorthand_templates_match_after_keyword() {
        let pack = RulePack::from_toml(
            r#"
name = "t"
[[keywords]]
keyword = "我感觉"
rank = 5
templates = ["为什么你会{0}？"]
"#,
        )
        .unwrap();
        assert_eq!(pack.name, "t");
        let entry = &pack.keywords[0];
        assert_eq!(entry.scope, MatchScope::AfterKeyword);
        assert_eq!(entry.rules[0].pattern, vec![PatternToken::Wildcard]);
    }

    #[test]
    fn explicit_rules_default_to_whole_utterance() {
        let pack = RulePack::from_toml(
            r#"
[[keywords]]
keyword = "Mother"
[[keywords.rules]]
pattern = "* my mother *"
templates = ["Tell me more about your mother.", "goto family"]
[[keywords.rules]]
pattern = "* my mother *"
templates = ["Earlier you mentioned your mother."]
memory = true
"#,
        )
        .unwrap();
        let entry = &pack.keywords[0];
        assert_eq!(entry.keyword, "mother");
        assert_eq!(entry.rank, DEFAULT_RANK);
        assert_eq!(entry.scope, MatchScope::Utterance);
        assert_eq!(entry.rules.len(), 1);
        assert_eq!(entry.memory_rules.len(), 1);
        assert_eq!(entry.rules[0].reassemblies[1], Reassembly::Goto("family".into()));
    }

    #[test]
    fn keyword_without_templates_is_rejected() {
        let err = RulePack::from_toml("[[keywords]]\nkeyword = \"x\"").unwrap_err();
        assert!(matches!(err, RuleDefinitionError::NoRules { .. }));
    }

    #[test]
    fn malformed_toml_is_rejected() {
        assert!(matches!(
            RulePack::from_toml("keywords = 3"),
            Err(RuleDefinitionError::Toml(_))
        ));
    }

    #[test]
    fn chinese_pack_merges_into_doctor() {
        let mut set = RuleSet::doctor().unwrap();
        let before = set.keyword_count();
        set.merge(RulePack::chinese().unwrap()).unwrap();
        assert!(set.keyword_count() > before);
        assert!(set.lookup("我感觉").is_some());
        assert!(set.exact_family("你好").is_some());
        assert_eq!(set.reflections()["我"], vec!["你".to_string()]);
    }

    #[test]
    fn merge_rejects_dangling_goto() {
        let mut set = RuleSet::doctor().unwrap();
        let pack = RulePack::from_toml(
            "[[keywords]]\nkeyword = \"x\"\ntemplates = [\"goto nowhere\"]",
        )
        .unwrap();
        assert!(matches!(
            set.merge(pack),
            Err(RuleDefinitionError::UnknownGoto { .. })
        ));
    }

    #[test]
    fn from_templates_builds_after_keyword_entries() {
        let templates: &[&str] = &["你的梦想是{0}吗？"];
        let pack = RulePack::from_templates("adhoc", &[("梦想", 4, templates)]).unwrap();
        assert_eq!(pack.keywords.len(), 1);
        assert_eq!(pack.keywords[0].scope, MatchScope::AfterKeyword);
    }
}
