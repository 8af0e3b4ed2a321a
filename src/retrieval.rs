use std::cmp::Ordering;
use std::collections::HashSet;

/// A corpus document paired with its similarity to the query. Scores are in
/// [0.0, 1.0] and only meaningful within a single ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument<'a> {
    pub text: &'a str,
    pub score: f32,
}

/// Ranks every corpus document against the query by token-set Jaccard
/// similarity and returns the top `k`, highest score first. The sort is
/// stable, so documents with equal scores keep their corpus order. Pure
/// function of its inputs.
pub fn rank<'a>(query: &str, corpus: &'a [String], k: usize) -> Vec<ScoredDocument<'a>> {
    let query_tokens = tokenize(query);

    let mut scored: Vec<ScoredDocument<'a>> = corpus
        .iter()
        .map(|doc| ScoredDocument {
            text: doc.as_str(),
            score: jaccard_similarity(&query_tokens, &tokenize(doc)),
        })
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored.truncate(k);
    scored
}

/// Lowercased whitespace tokens, duplicates collapsed.
fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// |intersection| / |union|, with the empty-union case pinned to 0.0.
fn jaccard_similarity(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }

    a.intersection(b).count() as f32 / union as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus(docs: &[&str]) -> Vec<String> {
        docs.iter().map(|doc| doc.to_string()).collect()
    }

    #[test]
    fn rank_returns_at_most_k_sorted_descending() {
        let corpus = corpus(&[
            "take a walk in the park",
            "visit a museum",
            "take a cooking class",
            "walk the dog in the park",
        ]);

        let ranked = rank("walk in the park", &corpus, 3);
        assert_eq!(ranked.len(), 3);
        for pair in ranked.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn rank_is_a_subset_of_the_corpus_without_duplicates() {
        let corpus = corpus(&["alpha beta", "beta gamma", "gamma delta"]);
        let ranked = rank("beta", &corpus, 10);

        assert_eq!(ranked.len(), corpus.len());
        let mut seen = HashSet::new();
        for doc in &ranked {
            assert!(corpus.iter().any(|d| d == doc.text));
            assert!(seen.insert(doc.text));
        }
    }

    #[test]
    fn empty_query_preserves_corpus_order() {
        let corpus = corpus(&["first", "second", "third", "fourth"]);
        let ranked = rank("", &corpus, 3);

        assert_eq!(ranked.len(), 3);
        assert!(ranked.iter().all(|doc| doc.score == 0.0));
        assert_eq!(ranked[0].text, "first");
        assert_eq!(ranked[1].text, "second");
        assert_eq!(ranked[2].text, "third");
    }

    #[test]
    fn rank_is_deterministic_across_calls() {
        let corpus = corpus(&["tie one", "tie two", "tie three"]);
        let first = rank("tie", &corpus, 3);
        let second = rank("tie", &corpus, 3);
        assert_eq!(first, second);
    }

    #[test]
    fn small_corpus_returns_everything() {
        let corpus = corpus(&["only", "two"]);
        assert_eq!(rank("anything", &corpus, 5).len(), 2);
    }

    #[test]
    fn exact_match_scores_one() {
        let corpus = corpus(&["go for a hike"]);
        let ranked = rank("go for a hike", &corpus, 1);
        assert!((ranked[0].score - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn jaccard_is_symmetric() {
        let a = tokenize("take a walk outside");
        let b = tokenize("walk the dog");
        assert_eq!(jaccard_similarity(&a, &b), jaccard_similarity(&b, &a));
    }

    #[test]
    fn jaccard_self_similarity_is_one() {
        let a = tokenize("visit a local museum");
        assert_eq!(jaccard_similarity(&a, &a), 1.0);
    }

    #[test]
    fn jaccard_of_empty_sets_is_zero() {
        let empty = tokenize("");
        assert_eq!(jaccard_similarity(&empty, &empty), 0.0);
    }

    #[test]
    fn tokens_are_lowercased_and_deduplicated() {
        let tokens = tokenize("Walk WALK walk the the park");
        assert_eq!(tokens.len(), 3);
        assert!(tokens.contains("walk"));
        assert!(tokens.contains("the"));
        assert!(tokens.contains("park"));
    }
}
