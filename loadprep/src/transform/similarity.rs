//! String similarity scores used by fuzzy matching.
//!
//! The default scorer is the gestalt pattern-matching ratio
//! (Ratcliff/Obershelp): twice the number of characters in matching blocks
//! divided by the combined length, where matching blocks are found by
//! repeatedly taking the longest common substring and recursing on both
//! sides of it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Sequences at least this long drop "popular" characters from the index,
/// the same heuristic sequence matchers commonly apply.
const AUTOJUNK_MIN_LEN: usize = 200;

/// Scoring strategy for [`crate::transform::fuzzy`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    /// Ratcliff/Obershelp ratio
    #[default]
    Gestalt,
    /// Jaro-Winkler similarity
    JaroWinkler,
    /// `1 - levenshtein / max_len`
    Levenshtein,
}

impl SimilarityMetric {
    /// Case-insensitive score in `[0, 1]`.
    pub fn score(&self, a: &str, b: &str) -> f64 {
        let a = a.to_lowercase();
        let b = b.to_lowercase();
        match self {
            SimilarityMetric::Gestalt => gestalt_ratio(&a, &b),
            SimilarityMetric::JaroWinkler => strsim::jaro_winkler(&a, &b),
            SimilarityMetric::Levenshtein => strsim::normalized_levenshtein(&a, &b),
        }
    }
}

/// Case-insensitive gestalt similarity between two strings.
///
/// ```ignore
/// use loadprep::similarity;
/// assert_eq!(similarity("Rock", "rock"), 1.0);
/// assert!(similarity("rokc", "rock") > similarity("jazz", "rock"));
/// ```
pub fn similarity(a: &str, b: &str) -> f64 {
    SimilarityMetric::Gestalt.score(a, b)
}

/// Gestalt ratio of two already-normalized strings.
pub fn gestalt_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    let matches = BlockMatcher::new(&a, &b).matching_characters();
    2.0 * matches as f64 / total as f64
}

struct BlockMatcher<'a> {
    a: &'a [char],
    b: &'a [char],
    /// Positions of each character of `b`, ascending.
    b2j: HashMap<char, Vec<usize>>,
}

impl<'a> BlockMatcher<'a> {
    fn new(a: &'a [char], b: &'a [char]) -> Self {
        let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
        for (j, c) in b.iter().enumerate() {
            b2j.entry(*c).or_default().push(j);
        }
        if b.len() >= AUTOJUNK_MIN_LEN {
            let threshold = b.len() / 100 + 1;
            b2j.retain(|_, positions| positions.len() <= threshold);
        }
        Self { a, b, b2j }
    }

    /// Total size of all matching blocks.
    fn matching_characters(&self) -> usize {
        let mut total = 0;
        let mut queue = vec![(0, self.a.len(), 0, self.b.len())];
        while let Some((alo, ahi, blo, bhi)) = queue.pop() {
            let (i, j, k) = self.longest_match(alo, ahi, blo, bhi);
            if k == 0 {
                continue;
            }
            total += k;
            if alo < i && blo < j {
                queue.push((alo, i, blo, j));
            }
            if i + k < ahi && j + k < bhi {
                queue.push((i + k, ahi, j + k, bhi));
            }
        }
        total
    }

    /// Longest block `a[i..i+k] == b[j..j+k]` inside the given windows;
    /// the earliest such block wins ties.
    fn longest_match(&self, alo: usize, ahi: usize, blo: usize, bhi: usize) -> (usize, usize, usize) {
        let (mut best_i, mut best_j, mut best_k) = (alo, blo, 0);
        let mut j2len: HashMap<usize, usize> = HashMap::new();

        for i in alo..ahi {
            let mut next: HashMap<usize, usize> = HashMap::new();
            if let Some(positions) = self.b2j.get(&self.a[i]) {
                for &j in positions {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }
                    let k = if j > 0 { j2len.get(&(j - 1)).copied().unwrap_or(0) } else { 0 } + 1;
                    next.insert(j, k);
                    if k > best_k {
                        best_i = i + 1 - k;
                        best_j = j + 1 - k;
                        best_k = k;
                    }
                }
            }
            j2len = next;
        }

        // Characters left out of the index can still extend a block
        while best_i > alo && best_j > blo && self.a[best_i - 1] == self.b[best_j - 1] {
            best_i -= 1;
            best_j -= 1;
            best_k += 1;
        }
        while best_i + best_k < ahi
            && best_j + best_k < bhi
            && self.a[best_i + best_k] == self.b[best_j + best_k]
        {
            best_k += 1;
        }

        (best_i, best_j, best_k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_identical_is_one() {
        assert_eq!(similarity("Hip Hop", "hip hop"), 1.0);
        assert_eq!(similarity("", ""), 1.0);
    }

    #[test]
    fn test_known_ratios() {
        // "abcd" vs "bcde": one block "bcd" -> 2*3/8
        assert!(close(similarity("abcd", "bcde"), 0.75));
        // "rock" vs "rokc": blocks "ro" + "k" -> 2*3/8
        assert!(close(similarity("rock", "rokc"), 0.75));
        assert_eq!(similarity("abc", "xyz"), 0.0);
        assert_eq!(similarity("", "abc"), 0.0);
    }

    #[test]
    fn test_symmetric_on_simple_inputs() {
        assert!(close(similarity("pop", "pops"), similarity("pops", "pop")));
    }

    #[test]
    fn test_noise_does_not_raise_score() {
        let base = similarity("jazz", "jazz fusion");
        let noisy = similarity("jazz", "jazz fusion qqqq");
        assert!(noisy <= base);
    }

    #[test]
    fn test_below_one_unless_equal() {
        assert!(similarity("classical", "classic") < 1.0);
    }

    #[test]
    fn test_long_sequences_still_score() {
        let a = "a".repeat(250);
        let b = "a".repeat(250);
        assert_eq!(similarity(&a, &b), 1.0);
    }

    #[test]
    fn test_alternative_metrics() {
        assert_eq!(SimilarityMetric::JaroWinkler.score("Metal", "metal"), 1.0);
        assert_eq!(SimilarityMetric::Levenshtein.score("Metal", "metal"), 1.0);
        assert!(SimilarityMetric::Levenshtein.score("metal", "petal") < 1.0);
    }
}
