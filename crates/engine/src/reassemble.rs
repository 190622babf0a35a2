//! Reply construction: pronoun reflection and template filling.

use std::collections::BTreeMap;

use crate::matcher::Captures;
use crate::model::{Segment, Template};
use crate::tokenize::{is_cjk, is_separator};

/// The standard first/second-person inversion table. Symmetric: every
/// entry's image maps back to it.
const REFLECTIONS: &[(&str, &str)] = &[
    ("i", "you"),
    ("me", "you"),
    ("you", "i"),
    ("my", "your"),
    ("your", "my"),
    ("mine", "yours"),
    ("yours", "mine"),
    ("myself", "yourself"),
    ("yourself", "myself"),
    ("am", "are"),
    ("are", "am"),
    ("i'm", "you are"),
    ("i've", "you have"),
    ("i'd", "you would"),
    ("i'll", "you will"),
    ("you've", "i have"),
    ("you'd", "i would"),
    ("you'll", "i will"),
];

/// Build the standard reflection table.
pub fn default_reflections() -> BTreeMap<String, Vec<String>> {
    REFLECTIONS
        .iter()
        .map(|(from, to)| {
            (
                (*from).to_string(),
                to.split_whitespace().map(String::from).collect(),
            )
        })
        .collect()
}

/// Invert pronouns word by word.
///
/// A capitalized source word yields a capitalized replacement (except the
/// pronoun "I", whose capital carries no sentence position); the pronoun
/// `i` is always written `I`.
pub fn reflect(words: &[String], table: &BTreeMap<String, Vec<String>>) -> Vec<String> {
    let mut out = Vec::with_capacity(words.len());
    for word in words {
        let lower = word.to_lowercase();
        let Some(replacement) = table.get(&lower) else {
            out.push(word.clone());
            continue;
        };
        let capitalize = word != "I" && word.chars().next().is_some_and(char::is_uppercase);
        for (i, r) in replacement.iter().enumerate() {
            let r = if r == "i" { "I".to_string() } else { r.clone() };
            out.push(if i == 0 && capitalize {
                capitalize_first(&r)
            } else {
                r
            });
        }
    }
    out
}

fn capitalize_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Fill a template from match captures.
///
/// Each capture is cut at its first clause separator, reflected, and
/// joined (with no spaces between ideographs). Placeholders past the end of
/// `captures` render empty.
pub fn reassemble(
    template: &Template,
    captures: &Captures,
    reflections: &BTreeMap<String, Vec<String>>,
) -> String {
    let mut out = String::new();
    for segment in template.segments() {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Capture(index) => {
                let words = captures.get(*index).map_or(&[][..], |c| {
                    let end = c.iter().position(|w| is_separator(w)).unwrap_or(c.len());
                    &c[..end]
                });
                out.push_str(&join_words(&reflect(words, reflections)));
            }
        }
    }
    tidy(&out)
}

/// Join words with spaces, except between two ideographic characters.
pub fn join_words(words: &[String]) -> String {
    let mut out = String::new();
    for word in words {
        let tight = match (out.chars().last(), word.chars().next()) {
            (Some(prev), Some(next)) => is_cjk(prev) && is_cjk(next),
            _ => true,
        };
        if !tight {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

fn is_closing_punct(c: char) -> bool {
    matches!(
        c,
        '?' | '.' | ',' | '!' | ';' | ':' | '？' | '。' | '，' | '！' | '；' | '：'
    )
}

/// Collapse runs of whitespace, drop space before closing punctuation and
/// between ideographs, and trim.
pub fn tidy(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            let prev = out.chars().last();
            let keep = !is_closing_punct(c) && !(prev.is_some_and(is_cjk) && is_cjk(c));
            if keep {
                out.push(' ');
            }
            pending_space = false;
        }
        out.push(c);
    }
    out
}
