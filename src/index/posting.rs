use crate::core::error::{Error, ErrorKind, Result};

pub const INITIAL_CAPACITY: usize = 128;

/// Postings of one word: parallel docid and frequency arrays.
/// Note: docids are strictly ascending, the merge depends on it
pub struct PostingList {
    docids: Vec<u32>,
    freqs: Vec<u8>,
}

impl PostingList {
    pub fn new() -> Self {
        PostingList {
            docids: Vec::with_capacity(INITIAL_CAPACITY),
            freqs: Vec::with_capacity(INITIAL_CAPACITY),
        }
    }

    pub fn last_docid(&self) -> Option<u32> {
        self.docids.last().copied()
    }

    /// Whether `docid` may be appended next
    pub fn accepts(&self, docid: u32) -> bool {
        self.last_docid().is_none_or(|last| docid > last)
    }

    pub fn push(&mut self, docid: u32, freq: u8) -> Result<()> {
        if !self.accepts(docid) {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("docid {} not above last posting {:?}", docid, self.last_docid()),
            ));
        }
        if self.docids.len() == self.docids.capacity() {
            // double
            let grow = self.docids.capacity().max(INITIAL_CAPACITY);
            self.docids.reserve_exact(grow);
            self.freqs.reserve_exact(grow);
        }
        self.docids.push(docid);
        self.freqs.push(freq);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.docids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docids.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.docids.capacity()
    }

    pub fn doc_freq(&self) -> u32 {
        self.docids.len() as u32
    }

    pub fn docids(&self) -> &[u32] {
        &self.docids
    }

    pub fn docid(&self, i: usize) -> u32 {
        self.docids[i]
    }

    pub fn frequency(&self, docid: u32) -> Option<u8> {
        self.docids.binary_search(&docid).ok().map(|i| self.freqs[i])
    }

    /// First position at or after `from` whose docid is `>= target`;
    /// `len()` when there is none
    pub fn seek(&self, from: usize, target: u32) -> usize {
        from + self.docids[from..].partition_point(|&d| d < target)
    }
}

impl Default for PostingList {
    fn default() -> Self {
        Self::new()
    }
}

/// Docids present in every list, ascending.
///
/// One forward cursor per list. The pivot list holds the current candidate;
/// the others catch up to it, and any list overshooting becomes the pivot.
pub fn intersect(lists: &[&PostingList]) -> Vec<u32> {
    let mut result = Vec::new();
    if lists.is_empty() || lists.iter().any(|l| l.is_empty()) {
        return result;
    }

    let mut cursors = vec![0usize; lists.len()];
    let mut pivot = 0;
    let mut candidate = lists[0].docid(0);
    for (i, l) in lists.iter().enumerate().skip(1) {
        if l.docid(0) > candidate {
            pivot = i;
            candidate = l.docid(0);
        }
    }

    'merge: loop {
        let mut aligned = false;
        while !aligned {
            aligned = true;
            for j in 0..lists.len() {
                if j == pivot {
                    continue;
                }
                cursors[j] = lists[j].seek(cursors[j], candidate);
                if cursors[j] == lists[j].len() {
                    break 'merge;
                }
                let docid = lists[j].docid(cursors[j]);
                if docid > candidate {
                    pivot = j;
                    candidate = docid;
                    aligned = false;
                    break;
                }
            }
        }

        result.push(candidate);

        cursors[pivot] += 1;
        if cursors[pivot] == lists[pivot].len() {
            break;
        }
        candidate = lists[pivot].docid(cursors[pivot]);
    }
    result
}
