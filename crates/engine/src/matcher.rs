//! Decomposition matching.
//!
//! Wildcards are greedy: the leftmost one takes as many words as it can
//! while the rest of the pattern still fits, then the next one, and so on.
//! Whether a pattern suffix fits a word suffix is tabulated once up front,
//! so a match costs time proportional to pattern length times input length
//! however many wildcards the pattern has.

use std::collections::BTreeMap;

use crate::model::PatternToken;

/// Captured word spans, one per wildcard or synonym token, in pattern order.
pub type Captures = Vec<Vec<String>>;

/// Match `pattern` against the whole of `words`.
///
/// A pattern made of a single wildcard needs at least one word.
pub fn match_pattern(
    pattern: &[PatternToken],
    words: &[String],
    synonyms: &BTreeMap<String, Vec<String>>,
) -> Option<Captures> {
    if matches!(pattern, [PatternToken::Wildcard]) && words.is_empty() {
        return None;
    }

    let fits = Fits::build(pattern, words, synonyms);
    if !fits.get(0, 0) {
        return None;
    }

    let mut captures = Vec::new();
    let mut at = 0;
    for (index, token) in pattern.iter().enumerate() {
        match token {
            PatternToken::Wildcard => {
                let end = (at..=words.len()).rev().find(|&end| fits.get(index + 1, end))?;
                captures.push(words[at..end].to_vec());
                at = end;
            }
            PatternToken::Synonym(_) => {
                captures.push(vec![words.get(at)?.clone()]);
                at += 1;
            }
            PatternToken::Literal(_) => at += 1,
        }
    }
    Some(captures)
}

/// `get(i, j)`: does `pattern[i..]` match `words[j..]`?
struct Fits {
    width: usize,
    cells: Vec<bool>,
}

impl Fits {
    fn build(
        pattern: &[PatternToken],
        words: &[String],
        synonyms: &BTreeMap<String, Vec<String>>,
    ) -> Self {
        let n = words.len();
        let width = n + 1;
        let mut cells = vec![false; (pattern.len() + 1) * width];
        cells[pattern.len() * width + n] = true;

        let lowered: Vec<String> = words.iter().map(|w| w.to_lowercase()).collect();
        for (i, token) in pattern.iter().enumerate().rev() {
            let (row, next) = (i * width, (i + 1) * width);
            match token {
                PatternToken::Wildcard => {
                    let mut any = false;
                    for j in (0..=n).rev() {
                        any |= cells[next + j];
                        cells[row + j] = any;
                    }
                }
                PatternToken::Synonym(root) => {
                    let group = synonyms.get(root);
                    for (j, word) in words.iter().enumerate() {
                        let in_group =
                            word == root || group.is_some_and(|g| g.iter().any(|w| w == word));
                        cells[row + j] = in_group && cells[next + j + 1];
                    }
                }
                PatternToken::Literal(literal) => {
                    for (j, word) in lowered.iter().enumerate() {
                        cells[row + j] = word == literal && cells[next + j + 1];
                    }
                }
            }
        }
        Self { width, cells }
    }

    fn get(&self, i: usize, j: usize) -> bool {
        self.cells.get(i * self.width + j).copied().unwrap_or(false)
    }
}
