use std::collections::HashMap;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{DocId, WordCount};
use crate::index::posting::{self, PostingList};

/// Memory-only word -> postings index answering conjunctive queries
pub struct InvertedIndex {
    postings: HashMap<String, PostingList>,
    doc_count: usize,
    total_tokens: u64,
}

impl InvertedIndex {
    pub fn new() -> Self {
        InvertedIndex {
            postings: HashMap::new(),
            doc_count: 0,
            total_tokens: 0,
        }
    }

    /// Append `docid` to the postings of every word. Repeated words are
    /// summed; frequencies saturate at 255. Nothing is appended unless
    /// `docid` is above the last docid of every word involved.
    pub fn index(&mut self, docid: DocId, words: &[WordCount]) -> Result<()> {
        let mut counts: HashMap<&str, u32> = HashMap::with_capacity(words.len());
        for wc in words {
            if wc.word.is_empty() {
                continue;
            }
            let total = counts.entry(wc.word.as_str()).or_insert(0);
            *total = total.saturating_add(wc.count);
        }

        let docid = docid.value();
        for word in counts.keys() {
            if let Some(list) = self.postings.get(*word) {
                if !list.accepts(docid) {
                    return Err(Error::new(
                        ErrorKind::InvalidInput,
                        format!(
                            "docid {} indexed out of order for word {:?}, last is {:?}",
                            docid, word, list.last_docid()
                        ),
                    ));
                }
            }
        }

        for (word, count) in counts {
            let freq = count.min(u8::MAX as u32) as u8;
            self.postings
                .entry(word.to_string())
                .or_default()
                .push(docid, freq)?;
            self.total_tokens += count as u64;
        }
        self.doc_count += 1;
        Ok(())
    }

    /// Docids whose postings contain every word, ascending
    pub fn query(&self, words: &[&str]) -> Result<Vec<DocId>> {
        if words.is_empty() {
            return Ok(Vec::new());
        }

        let mut lists = Vec::with_capacity(words.len());
        for word in words {
            let list = self.postings.get(*word).ok_or_else(|| {
                Error::new(ErrorKind::TermNotFound, format!("word {:?} is not indexed", word))
            })?;
            lists.push(list);
        }

        Ok(posting::intersect(&lists).into_iter().map(DocId).collect())
    }

    pub fn frequency(&self, word: &str, docid: DocId) -> Option<u8> {
        self.postings.get(word)?.frequency(docid.value())
    }

    pub fn doc_freq(&self, word: &str) -> u32 {
        self.postings.get(word).map_or(0, |l| l.doc_freq())
    }

    pub fn term_count(&self) -> usize {
        self.postings.len()
    }

    /// Number of `index` calls that succeeded
    pub fn doc_count(&self) -> usize {
        self.doc_count
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_tokens
    }
}

impl Default for InvertedIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(pairs: &[(&str, u32)]) -> Vec<WordCount> {
        pairs.iter().map(|&(w, c)| WordCount::new(w, c)).collect()
    }

    #[test]
    fn conjunctive_query() {
        let mut index = InvertedIndex::new();
        for d in [2u32, 5, 9] {
            index.index(DocId(d), &words(&[("a", 1)])).unwrap();
        }
        for d in [5u32, 9, 12] {
            index.index(DocId(d), &words(&[("b", 1)])).unwrap();
        }
        for d in [5u32, 20] {
            index.index(DocId(d), &words(&[("c", 1)])).unwrap();
        }

        assert_eq!(index.query(&["a", "b", "c"]).unwrap(), vec![DocId(5)]);
        assert_eq!(index.query(&["a", "b"]).unwrap(), vec![DocId(5), DocId(9)]);
        assert_eq!(index.query(&["a", "zzz"]).unwrap_err().kind, ErrorKind::TermNotFound);
        assert!(index.query(&[]).unwrap().is_empty());
    }

    #[test]
    fn frequencies_merge_and_saturate() {
        let mut index = InvertedIndex::new();
        index
            .index(DocId(0), &words(&[("x", 200), ("y", 3), ("x", 100)]))
            .unwrap();
        assert_eq!(index.frequency("x", DocId(0)), Some(255));
        assert_eq!(index.frequency("y", DocId(0)), Some(3));
        assert_eq!(index.doc_freq("x"), 1);
        assert_eq!(index.term_count(), 2);
    }

    #[test]
    fn huge_counts_saturate_instead_of_overflowing() {
        let mut index = InvertedIndex::new();
        index
            .index(DocId(0), &words(&[("x", u32::MAX), ("x", 2), ("y", u32::MAX)]))
            .unwrap();
        assert_eq!(index.frequency("x", DocId(0)), Some(255));
        assert_eq!(index.frequency("y", DocId(0)), Some(255));
        assert_eq!(index.total_tokens(), 2 * u32::MAX as u64);
    }

    #[test]
    fn out_of_order_docid_leaves_index_untouched() {
        let mut index = InvertedIndex::new();
        index.index(DocId(4), &words(&[("a", 1)])).unwrap();

        let err = index.index(DocId(3), &words(&[("new", 1), ("a", 1)])).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidInput);
        assert_eq!(index.term_count(), 1);
        assert_eq!(index.doc_freq("a"), 1);
    }
}
