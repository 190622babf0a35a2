//! Classic line-oriented script format.
//!
//! ```text
//! initial: How do you do.  Please tell me your problem.
//! final: Goodbye.
//! quit: bye
//! pre: dont don't
//! post: my your
//! synon: sad unhappy depressed
//! key: remember 5
//!   decomp: * i remember *
//!     reasmb: Do you often think of (2) ?
//!     reasmb: goto what
//!   decomp: $ * my *
//!     reasmb: Earlier you said your (2).
//! ```
//!
//! Indentation is cosmetic. `#` starts a comment line. A `$` before a
//! decomposition marks it memory-worthy. The `xnone` key supplies the
//! default prompts and is not registered as a keyword.

use std::path::Path;

use crate::RuleDefinitionError;
use crate::model::{
    DEFAULT_RANK, ExactFamily, FAREWELL_FAMILY, KeywordEntry, Reassembly, Rule, RuleSet, Template,
    parse_pattern,
};

/// Keyword whose reassemblies become the default prompts.
const DEFAULTS_KEY: &str = "xnone";

/// The bundled DOCTOR script.
const DOCTOR_SCRIPT: &str = include_str!("../data/doctor.txt");

/// Where the next `reasmb:` line goes.
#[derive(Clone, Copy)]
enum Target {
    Rule(usize),
    Memory(usize),
}

impl RuleSet {
    /// The bundled DOCTOR script.
    pub fn doctor() -> Result<Self, RuleDefinitionError> {
        Self::from_script(DOCTOR_SCRIPT)
    }

    /// Load a classic script from disk.
    pub fn from_script_file(path: &Path) -> Result<Self, RuleDefinitionError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_script(&text)
    }

    /// Parse and validate a classic script.
    pub fn from_script(text: &str) -> Result<Self, RuleDefinitionError> {
        let mut set = RuleSet::new();
        let mut entries: Vec<KeywordEntry> = Vec::new();
        let mut target: Option<Target> = None;
        let mut quits: Vec<String> = Vec::new();
        let mut finals: Vec<Template> = Vec::new();

        for (index, raw) in text.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let syntax = |reason: &str| RuleDefinitionError::Syntax {
                line: line_no,
                reason: reason.to_string(),
            };

            let (tag, content) = line
                .split_once(':')
                .ok_or_else(|| syntax("expected 'tag: content'"))?;
            let content = content.trim();

            match tag.trim() {
                "initial" => set.add_initial(content.to_string()),
                "final" => finals.push(Template::parse_classic(content)?),
                "quit" => quits.push(content.to_lowercase()),
                "pre" | "post" => {
                    let mut words = content.split_whitespace().map(str::to_lowercase);
                    let from = words
                        .next()
                        .ok_or_else(|| syntax("substitution needs a word to replace"))?;
                    let to: Vec<String> = words.collect();
                    if to.is_empty() {
                        return Err(syntax("substitution needs a replacement"));
                    }
                    if tag.trim() == "pre" {
                        set.add_pre(from, to);
                    } else {
                        set.add_reflection(from, to);
                    }
                }
                "synon" => {
                    let group: Vec<String> =
                        content.split_whitespace().map(str::to_lowercase).collect();
                    let root = group
                        .first()
                        .cloned()
                        .ok_or_else(|| syntax("empty synonym group"))?;
                    set.add_synonyms(root, group);
                }
                "key" => {
                    let mut parts = content.split_whitespace();
                    let keyword = parts.next().ok_or_else(|| syntax("key needs a keyword"))?;
                    let rank = match parts.next() {
                        Some(r) => r.parse().map_err(|_| syntax("rank must be an integer"))?,
                        None => DEFAULT_RANK,
                    };
                    entries.push(KeywordEntry::new(keyword, rank));
                    target = None;
                }
                "decomp" => {
                    let entry = entries
                        .last_mut()
                        .ok_or_else(|| syntax("decomp before any key"))?;
                    let (memory, pattern) = match content.strip_prefix('$') {
                        Some(rest) => (true, rest),
                        None => (false, content),
                    };
                    let rule = Rule::new(parse_pattern(pattern), Vec::new());
                    target = Some(if memory {
                        entry.memory_rules.push(rule);
                        Target::Memory(entry.memory_rules.len() - 1)
                    } else {
                        entry.rules.push(rule);
                        Target::Rule(entry.rules.len() - 1)
                    });
                }
                "reasmb" => {
                    let entry = entries.last_mut();
                    let rule = match (entry, target) {
                        (Some(e), Some(Target::Rule(i))) => e.rules.get_mut(i),
                        (Some(e), Some(Target::Memory(i))) => e.memory_rules.get_mut(i),
                        _ => None,
                    }
                    .ok_or_else(|| syntax("reasmb before any decomp"))?;
                    rule.reassemblies.push(parse_reassembly(content)?);
                }
                other => return Err(syntax(&format!("unknown tag '{other}'"))),
            }
        }

        if let Some(pos) = entries.iter().position(|e| e.keyword == DEFAULTS_KEY) {
            let defaults = entries.remove(pos);
            let prompts = defaults
                .rules
                .into_iter()
                .flat_map(|r| r.reassemblies)
                .map(|r| match r {
                    Reassembly::Template(t) => Ok(t),
                    Reassembly::Goto(_) => Err(RuleDefinitionError::InvalidDefaults(
                        "default prompts cannot use goto".into(),
                    )),
                })
                .collect::<Result<Vec<_>, _>>()?;
            set.set_default_prompts(prompts);
        }

        for entry in entries {
            set.register(entry);
        }

        if !quits.is_empty() {
            set.add_exact_family(ExactFamily {
                name: FAREWELL_FAMILY.into(),
                words: quits,
                responses: finals,
            });
        }

        set.validate()?;
        Ok(set)
    }
}

/// `goto <key>` or a `(n)` template.
fn parse_reassembly(content: &str) -> Result<Reassembly, RuleDefinitionError> {
    match content.strip_prefix("goto ") {
        Some(target) => Ok(Reassembly::Goto(target.trim().to_lowercase())),
        None => Ok(Reassembly::Template(Template::parse_classic(content)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MatchScope, PatternToken};

    const MINI: &str = r#"
initial: Hi.
final: Bye now.
quit: bye
pre: dont don't
post: my your
synon: sad unhappy
key: xnone
  decomp: *
    reasmb: Go on.
key: sorry 2
  decomp: *
    reasmb: No need.
key: my 3
  decomp: $ * my *
    reasmb: Earlier you said your (2).
  decomp: * my *
    reasmb: Your (2) ?
    reasmb: goto sorry
"#;

    #[test]
    fn parses_all_tags() {
        let set = RuleSet::from_script(MINI).unwrap();
        assert_eq!(set.initials(), &["Hi.".to_string()]);
        assert_eq!(set.keyword_count(), 2);
        assert!(set.lookup("xnone").is_none());
        assert_eq!(set.default_prompts().len(), 1);
        assert_eq!(set.pre_substitutions()["dont"], vec!["don't".to_string()]);
        assert_eq!(set.synonyms()["sad"], vec!["sad".to_string(), "unhappy".to_string()]);

        let my = set.lookup("my").unwrap();
        assert_eq!(my.rank, 3);
        assert_eq!(my.scope, MatchScope::Utterance);
        assert_eq!(my.memory_rules.len(), 1);
        assert_eq!(my.rules.len(), 1);
        assert_eq!(my.rules[0].pattern[1], PatternToken::Literal("my".into()));
        assert_eq!(my.rules[0].reassemblies[1], Reassembly::Goto("sorry".into()));

        let farewell = set.exact_family("bye").unwrap();
        assert_eq!(farewell.name, FAREWELL_FAMILY);
    }

    #[test]
    fn unranked_key_gets_default_rank() {
        let set = RuleSet::from_script("key: hello\n decomp: *\n  reasmb: Hi.").unwrap();
        assert_eq!(set.lookup("hello").unwrap().rank, DEFAULT_RANK);
    }

    #[test]
    fn doctor_script_loads() {
        let set = RuleSet::doctor().unwrap();
        assert!(set.keyword_count() > 30);
        assert!(set.lookup("remember").is_some());
        assert!(!set.initials().is_empty());
        assert_eq!(set.default_prompts().len(), 4);
        assert!(set.exact_family("goodbye").is_some());
    }

    #[test]
    fn loading_twice_is_identical() {
        let a = RuleSet::doctor().unwrap();
        let b = RuleSet::doctor().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.digest(), b.digest());
    }

    #[test]
    fn reports_line_numbers() {
        let err = RuleSet::from_script("key: a\n  reasmb: oops").unwrap_err();
        assert!(matches!(err, RuleDefinitionError::Syntax { line: 2, .. }));

        let err = RuleSet::from_script("\n\nbogus line").unwrap_err();
        assert!(matches!(err, RuleDefinitionError::Syntax { line: 3, .. }));

        let err = RuleSet::from_script("key: a x").unwrap_err();
        assert!(err.to_string().contains("rank"));
    }

    #[test]
    fn rejects_placeholder_beyond_captures() {
        let err = RuleSet::from_script("key: a\n decomp: * a\n  reasmb: (2)").unwrap_err();
        assert!(matches!(
            err,
            RuleDefinitionError::PlaceholderOutOfRange { available: 1, .. }
        ));
    }

    #[test]
    fn rejects_dangling_goto() {
        let err = RuleSet::from_script("key: a\n decomp: *\n  reasmb: goto b").unwrap_err();
        assert!(matches!(err, RuleDefinitionError::UnknownGoto { .. }));
    }

    #[test]
    fn rejects_decomposition_without_reassembly() {
        let err = RuleSet::from_script("key: a\n decomp: *").unwrap_err();
        assert!(matches!(err, RuleDefinitionError::EmptyTemplates { .. }));
    }

    #[test]
    fn rejects_unknown_tag() {
        let err = RuleSet::from_script("color: blue").unwrap_err();
        assert!(err.to_string().contains("unknown tag"));
    }

    #[test]
    fn quit_without_final_is_rejected() {
        let err = RuleSet::from_script("quit: bye").unwrap_err();
        assert!(matches!(err, RuleDefinitionError::InvalidFamily { .. }));
    }
}
