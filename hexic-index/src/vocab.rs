//! The vocabulary interface consumed by the engine, plus a sorted
//! in-memory implementation used by fixtures and tests.

use hexic_core::Id;

/// Lookup interface of the knowledge-base vocabulary.
///
/// Ids are positions in the sorted word list, so lexicographic word order
/// equals id order. The four boundary lookups return ids usable directly
/// in comparisons against vocabulary columns:
///
/// - `get_value_id_for_ge(w)` / `get_value_id_for_gt(w)`: the smallest id
///   whose word is `>= w` / `> w`; an id satisfies the bound iff it is
///   `>=` the returned id.
/// - `get_value_id_for_lt(w)` / `get_value_id_for_le(w)`: ids strictly
///   below the returned id have words `< w` / `<= w`.
pub trait Vocabulary: Send + Sync {
    /// Exact lookup of a word.
    fn get_id(&self, word: &str) -> Option<Id>;

    fn get_value_id_for_ge(&self, word: &str) -> Id;
    fn get_value_id_for_gt(&self, word: &str) -> Id;
    fn get_value_id_for_lt(&self, word: &str) -> Id;
    fn get_value_id_for_le(&self, word: &str) -> Id;

    /// The word of an id, when the id is within the vocabulary.
    fn id_to_optional_string(&self, id: Id) -> Option<String>;

    /// Number of words.
    fn len(&self) -> usize;

    /// Whether the vocabulary is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A sorted, fully resident vocabulary.
#[derive(Debug, Default)]
pub struct SimpleVocabulary {
    words: Vec<String>,
}

impl SimpleVocabulary {
    /// Build from words; sorts and deduplicates.
    pub fn new(mut words: Vec<String>) -> Self {
        words.sort();
        words.dedup();
        Self { words }
    }

    /// The sorted word list.
    pub fn words(&self) -> &[String] {
        &self.words
    }
}

impl Vocabulary for SimpleVocabulary {
    fn get_id(&self, word: &str) -> Option<Id> {
        self.words
            .binary_search_by(|w| w.as_str().cmp(word))
            .ok()
            .map(|i| i as Id)
    }

    fn get_value_id_for_ge(&self, word: &str) -> Id {
        self.words.partition_point(|w| w.as_str() < word) as Id
    }

    fn get_value_id_for_gt(&self, word: &str) -> Id {
        self.words.partition_point(|w| w.as_str() <= word) as Id
    }

    fn get_value_id_for_lt(&self, word: &str) -> Id {
        self.get_value_id_for_ge(word)
    }

    fn get_value_id_for_le(&self, word: &str) -> Id {
        self.get_value_id_for_gt(word)
    }

    fn id_to_optional_string(&self, id: Id) -> Option<String> {
        self.words.get(id as usize).cloned()
    }

    fn len(&self) -> usize {
        self.words.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab() -> SimpleVocabulary {
        SimpleVocabulary::new(
            ["<a>", "<b>", "<d>", "<e>"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }

    #[test]
    fn test_exact_lookup() {
        let v = vocab();
        assert_eq!(v.get_id("<b>"), Some(1));
        assert_eq!(v.get_id("<c>"), None);
        assert_eq!(v.id_to_optional_string(2), Some("<d>".to_string()));
        assert_eq!(v.id_to_optional_string(99), None);
    }

    #[test]
    fn test_boundary_ids() {
        let v = vocab();
        // "<c>" is absent; ids 0..2 are < "<c>", ids 2.. are > "<c>".
        assert_eq!(v.get_value_id_for_ge("<c>"), 2);
        assert_eq!(v.get_value_id_for_gt("<c>"), 2);
        assert_eq!(v.get_value_id_for_lt("<c>"), 2);
        assert_eq!(v.get_value_id_for_le("<c>"), 2);
        // "<b>" is present at id 1.
        assert_eq!(v.get_value_id_for_ge("<b>"), 1);
        assert_eq!(v.get_value_id_for_gt("<b>"), 2);
        assert_eq!(v.get_value_id_for_le("<b>"), 2);
    }
}
