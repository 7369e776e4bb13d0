use std::collections::{BTreeMap, BTreeSet};
use fieldvault::core::types::{DocId, WordCount};
use fieldvault::index::inverted::InvertedIndex;
use proptest::prelude::*;

const VOCABULARY: [&str; 5] = ["alpha", "beta", "gamma", "delta", "omega"];

/// Word sets per document, docids are the positions
fn corpus() -> impl Strategy<Value = Vec<BTreeSet<usize>>> {
    prop::collection::vec(prop::collection::btree_set(0..VOCABULARY.len(), 0..4), 1..80)
}

fn naive(docs: &[BTreeSet<usize>], words: &[usize]) -> Vec<DocId> {
    docs.iter()
        .enumerate()
        .filter(|(_, set)| words.iter().all(|w| set.contains(w)))
        .map(|(d, _)| DocId(d as u32))
        .collect()
}

proptest! {
    #[test]
    fn query_matches_naive_intersection(
        docs in corpus(),
        words in prop::collection::btree_set(0..VOCABULARY.len(), 1..4),
    ) {
        let mut index = InvertedIndex::new();
        for (docid, set) in docs.iter().enumerate() {
            let counts: Vec<WordCount> = set.iter().map(|&w| WordCount::new(VOCABULARY[w], 1)).collect();
            index.index(DocId(docid as u32), &counts).unwrap();
        }

        let words: Vec<usize> = words.into_iter().collect();
        let query: Vec<&str> = words.iter().map(|&w| VOCABULARY[w]).collect();
        let indexed = words.iter().all(|&w| docs.iter().any(|set| set.contains(&w)));

        match index.query(&query) {
            Ok(hits) => {
                prop_assert!(indexed);
                prop_assert_eq!(hits, naive(&docs, &words));
            }
            Err(_) => prop_assert!(!indexed),
        }
    }

    #[test]
    fn frequencies_are_summed_and_saturate(
        counts in prop::collection::vec(prop_oneof![0u32..200, (u32::MAX - 300)..=u32::MAX], 1..6),
    ) {
        let mut index = InvertedIndex::new();
        let words: Vec<WordCount> = counts.iter().map(|&c| WordCount::new("w", c)).collect();
        index.index(DocId(0), &words).unwrap();

        let total = counts.iter().fold(0u32, |acc, &c| acc.saturating_add(c));
        prop_assert_eq!(index.frequency("w", DocId(0)), Some(total.min(255) as u8));
        prop_assert_eq!(index.total_tokens(), total as u64);
    }

    #[test]
    fn doc_freq_counts_documents(assignments in prop::collection::vec(0..VOCABULARY.len(), 1..60)) {
        let mut index = InvertedIndex::new();
        let mut expected: BTreeMap<usize, u32> = BTreeMap::new();
        for (docid, &w) in assignments.iter().enumerate() {
            index.index(DocId(docid as u32), &[WordCount::new(VOCABULARY[w], 3)]).unwrap();
            *expected.entry(w).or_insert(0) += 1;
        }

        for (w, word) in VOCABULARY.iter().enumerate() {
            prop_assert_eq!(index.doc_freq(word), expected.get(&w).copied().unwrap_or(0));
        }
        prop_assert_eq!(index.term_count(), expected.len());
        prop_assert_eq!(index.doc_count(), assignments.len());
    }
}
