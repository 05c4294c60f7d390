//! Fuzzy symbol resolution for names that fail to match exactly.

use crate::target::Target;

/// A scored symbol match.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolMatch {
    /// Matched symbol name.
    pub name: String,
    /// Load address of the symbol.
    pub address: u64,
    /// Similarity score in `[0, 1]`; exact matches score 1.0.
    pub score: f64,
}

/// Resolves symbols that fail to match exactly using fuzzy matching.
///
/// Lookup order: exact function match, then symbol match, then a substring
/// search on the last path segment scored by string similarity.
#[derive(Debug, Clone)]
pub struct SymbolResolver {
    similarity_threshold: f64,
}

impl Default for SymbolResolver {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.7,
        }
    }
}

impl SymbolResolver {
    /// Create a resolver with a custom similarity threshold.
    pub fn new(similarity_threshold: f64) -> Self {
        Self {
            similarity_threshold,
        }
    }

    /// Attempt to resolve `name`, falling back to fuzzy matching.
    pub fn resolve(&self, name: &str, target: &Target) -> Vec<SymbolMatch> {
        let exact = target.find_functions(name);
        if exact.iter().any(|hit| hit.name == name) {
            return exact
                .into_iter()
                .filter(|hit| hit.name == name)
                .map(|hit| SymbolMatch {
                    name: hit.name,
                    address: hit.address,
                    score: 1.0,
                })
                .collect();
        }

        let symbols = target.find_symbols(name);
        if symbols.iter().any(|hit| hit.name == name) {
            return symbols
                .into_iter()
                .filter(|hit| hit.name == name)
                .map(|hit| SymbolMatch {
                    name: hit.name,
                    address: hit.address,
                    score: 1.0,
                })
                .collect();
        }

        self.fuzzy_match(name, target)
    }

    /// Return the best match, or `None` when nothing clears the threshold.
    pub fn best_match(&self, name: &str, target: &Target) -> Option<SymbolMatch> {
        self.resolve(name, target).into_iter().next()
    }

    fn fuzzy_match(&self, name: &str, target: &Target) -> Vec<SymbolMatch> {
        // Search with the trailing path segment so `ns::inner::frob` still
        // surfaces `frob_impl`.
        let search_term = name.rsplit("::").next().unwrap_or(name);

        let mut candidates: Vec<SymbolMatch> = target
            .find_functions(search_term)
            .into_iter()
            .filter_map(|hit| {
                let score = similarity(&name.to_lowercase(), &hit.name.to_lowercase());
                (score >= self.similarity_threshold).then_some(SymbolMatch {
                    name: hit.name,
                    address: hit.address,
                    score,
                })
            })
            .collect();

        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        candidates
    }
}

/// Similarity ratio between two strings: `2 * lcs / (len_a + len_b)`.
fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    // Longest common subsequence, single-row DP.
    let mut prev = vec![0usize; b.len() + 1];
    let mut current = vec![0usize; b.len() + 1];
    for &ca in &a {
        for (j, &cb) in b.iter().enumerate() {
            current[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(current[j])
            };
        }
        std::mem::swap(&mut prev, &mut current);
        current.fill(0);
    }
    let lcs = prev[b.len()];
    (2.0 * lcs as f64) / (a.len() + b.len()) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::{ScriptedBackend, ScriptedState};
    use std::sync::Arc;

    fn target() -> Target {
        Target::new(Arc::new(ScriptedBackend::new(ScriptedState::sample())))
    }

    #[test]
    fn exact_match_scores_one() {
        let resolver = SymbolResolver::default();
        let matches = resolver.resolve("main", &target());
        assert_eq!(matches[0].name, "main");
        assert_eq!(matches[0].score, 1.0);
    }

    #[test]
    fn fuzzy_match_clears_threshold() {
        let resolver = SymbolResolver::new(0.5);
        // sample target has `process_image`; a near-miss should still hit
        let matches = resolver.resolve("process_imag", &target());
        assert!(matches.iter().any(|m| m.name == "process_image"));
        assert!(matches[0].score < 1.0);
    }

    #[test]
    fn no_match_below_threshold() {
        let resolver = SymbolResolver::new(0.95);
        assert!(resolver.best_match("zzzzzz", &target()).is_none());
    }

    #[test]
    fn similarity_bounds() {
        assert_eq!(similarity("abc", "abc"), 1.0);
        assert_eq!(similarity("abc", ""), 0.0);
        let s = similarity("process_image", "process_imag");
        assert!(s > 0.9 && s < 1.0);
    }
}
