//! Utterance normalization.
//!
//! Turns raw user text into the token list the matcher works on:
//!
//! 1. lowercase
//! 2. clause punctuation (`, . ; ! ?` and their full-width forms) becomes a
//!    separator token; other decoration is dropped
//! 3. split on whitespace
//! 4. unspaced ideographic runs are segmented against the rule set's
//!    lexicon, longest entry first; unknown stretches stay together
//! 5. pre-substitutions are applied token by token

use crate::model::RuleSet;

/// Separator tokens emitted for clause punctuation.
const SEPARATORS: &[&str] = &[".", ",", ";", "，", "。", "；"];

/// Whether `token` is a clause separator.
pub fn is_separator(token: &str) -> bool {
    SEPARATORS.contains(&token)
}

/// Whether `c` belongs to a script written without spaces between words.
pub fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{3040}'..='\u{30FF}'     // kana
        | '\u{3400}'..='\u{4DBF}'   // CJK extension A
        | '\u{4E00}'..='\u{9FFF}'   // CJK unified ideographs
        | '\u{AC00}'..='\u{D7AF}'   // hangul syllables
        | '\u{F900}'..='\u{FAFF}'   // compatibility ideographs
        | '\u{20000}'..='\u{2A6DF}' // extension B
    )
}

/// Punctuation mapped to a separator token.
fn separator_for(c: char) -> Option<&'static str> {
    match c {
        '.' | '!' | '?' => Some("."),
        ',' => Some(","),
        ';' => Some(";"),
        '。' | '！' | '？' => Some("。"),
        '，' | '、' => Some("，"),
        '；' => Some("；"),
        _ => None,
    }
}

/// Punctuation that carries no meaning for matching.
fn is_noise(c: char) -> bool {
    matches!(
        c,
        '"' | '“' | '”' | '(' | ')' | '[' | ']' | '{' | '}' | '<' | '>' | ':'
            | '*' | '~' | '`' | '…' | '：' | '（' | '）' | '「' | '」' | '『' | '』' | '《'
            | '》' | '【' | '】'
    )
}

/// Normalize an utterance into matcher tokens.
pub fn normalize(text: &str, rules: &RuleSet) -> Vec<String> {
    let mut spaced = String::with_capacity(text.len() + 8);
    for c in text.to_lowercase().chars() {
        if matches!(c, '‘' | '’') {
            spaced.push('\'');
        } else if let Some(sep) = separator_for(c) {
            spaced.push(' ');
            spaced.push_str(sep);
            spaced.push(' ');
        } else if is_noise(c) {
            spaced.push(' ');
        } else {
            spaced.push(c);
        }
    }

    let lexicon = Lexicon::new(rules);
    let mut tokens = Vec::new();
    for word in spaced.split_whitespace() {
        let word = word.trim_matches('\'');
        if word.is_empty() {
            continue;
        }
        for piece in split_scripts(word) {
            if piece.chars().next().is_some_and(is_cjk) {
                lexicon.segment(piece, &mut tokens);
            } else {
                tokens.push(piece.to_string());
            }
        }
    }

    let pre = rules.pre_substitutions();
    tokens
        .into_iter()
        .flat_map(|t| match pre.get(&t) {
            Some(replacement) => replacement.clone(),
            None => vec![t],
        })
        .collect()
}

/// Split a word into maximal runs of ideographic and non-ideographic text.
fn split_scripts(word: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut current: Option<bool> = None;
    for (i, c) in word.char_indices() {
        let cjk = is_cjk(c);
        if current.is_some_and(|prev| prev != cjk) {
            pieces.push(&word[start..i]);
            start = i;
        }
        current = Some(cjk);
    }
    if start < word.len() {
        pieces.push(&word[start..]);
    }
    pieces
}

/// Ideographic lexicon entries, longest first.
struct Lexicon<'a> {
    entries: Vec<&'a str>,
}

impl<'a> Lexicon<'a> {
    fn new(rules: &'a RuleSet) -> Self {
        let mut entries: Vec<&str> = rules
            .lexicon()
            .filter(|w| !w.is_empty() && w.chars().all(is_cjk))
            .collect();
        entries.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));
        entries.dedup();
        Self { entries }
    }

    /// Greedy longest-match segmentation of one ideographic run.
    fn segment(&self, run: &str, out: &mut Vec<String>) {
        let mut pending = String::new();
        let mut rest = run;
        while !rest.is_empty() {
            if let Some(entry) = self.entries.iter().find(|e| rest.starts_with(**e)) {
                if !pending.is_empty() {
                    out.push(std::mem::take(&mut pending));
                }
                out.push((*entry).to_string());
                rest = &rest[entry.len()..];
            } else {
                let mut chars = rest.chars();
                if let Some(c) = chars.next() {
                    pending.push(c);
                }
                rest = chars.as_str();
            }
        }
        if !pending.is_empty() {
            out.push(pending);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::KeywordEntry;

    fn rules_with(keywords: &[&str]) -> RuleSet {
        let mut set = RuleSet::new();
        for k in keywords {
            set.register(KeywordEntry::with_templates(*k, 1, &["x"]).unwrap());
        }
        set
    }

    #[test]
    fn lowercases_and_separates_punctuation() {
        let set = RuleSet::new();
        assert_eq!(
            normalize("Well, I remember  my Dog!", &set),
            vec!["well", ",", "i", "remember", "my", "dog", "."]
        );
    }

    #[test]
    fn keeps_apostrophes_inside_words() {
        let set = RuleSet::new();
        assert_eq!(
            normalize("I don't 'know'", &set),
            vec!["i", "don't", "know"]
        );
    }

    #[test]
    fn typographic_apostrophes_fold_to_ascii() {
        let set = RuleSet::new();
        assert_eq!(
            normalize("I’m sure it‘s ‘fine’", &set),
            vec!["i'm", "sure", "it's", "fine"]
        );
    }

    #[test]
    fn drops_decoration() {
        let set = RuleSet::new();
        assert_eq!(normalize("\"hello\" (there)", &set), vec!["hello", "there"]);
    }

    #[test]
    fn segments_ideographs_by_lexicon() {
        let set = rules_with(&["我", "我感觉", "难过"]);
        assert_eq!(normalize("我感觉难过", &set), vec!["我感觉", "难过"]);
        assert_eq!(
            normalize("我今天感到很难过", &set),
            vec!["我", "今天感到很", "难过"]
        );
    }

    #[test]
    fn full_width_punctuation_separates() {
        let set = rules_with(&["难过"]);
        assert_eq!(
            normalize("难过，真的。", &set),
            vec!["难过", "，", "真的", "。"]
        );
    }

    #[test]
    fn mixed_scripts_split() {
        let set = rules_with(&["你好"]);
        assert_eq!(normalize("eliza你好", &set), vec!["eliza", "你好"]);
    }

    #[test]
    fn no_lexicon_keeps_run_whole() {
        let set = RuleSet::new();
        assert_eq!(normalize("今天天气怎么样", &set), vec!["今天天气怎么样"]);
    }

    #[test]
    fn blank_input_yields_nothing() {
        let set = RuleSet::new();
        assert!(normalize("   ", &set).is_empty());
    }
}
