use byteorder::{ByteOrder, LittleEndian};

/// Bytes taken by a record carrying `count` pairs
pub fn record_len(count: usize) -> usize {
    1 + count * 5
}

/// Pack `(field_id, value_id)` pairs as
/// `[k:u8][field_id:u8 x k][value_id:u32 LE x k]`, sorted by field id.
///
/// The caller guarantees field ids are unique and there are at most 255 pairs.
pub fn encode(pairs: &mut [(u8, u32)]) -> Box<[u8]> {
    pairs.sort_unstable_by_key(|&(field_id, _)| field_id);

    let count = pairs.len();
    let mut buf = vec![0u8; record_len(count)];
    buf[0] = count as u8;
    for (i, &(field_id, value_id)) in pairs.iter().enumerate() {
        buf[1 + i] = field_id;
        let at = 1 + count + i * 4;
        LittleEndian::write_u32(&mut buf[at..at + 4], value_id);
    }
    buf.into_boxed_slice()
}

/// Typed view over a packed record
#[derive(Debug, Clone, Copy)]
pub struct RecordView<'a> {
    field_ids: &'a [u8],
    value_ids: &'a [u8],
}

impl<'a> RecordView<'a> {
    /// `None` unless the buffer length matches its count and the field ids
    /// are strictly ascending
    pub fn parse(buf: &'a [u8]) -> Option<Self> {
        let (&count, rest) = buf.split_first()?;
        let count = count as usize;
        if buf.len() != record_len(count) {
            return None;
        }
        let (field_ids, value_ids) = rest.split_at(count);
        if field_ids.windows(2).any(|w| w[0] >= w[1]) {
            return None;
        }
        Some(RecordView { field_ids, value_ids })
    }

    pub fn len(&self) -> usize {
        self.field_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.field_ids.is_empty()
    }

    pub fn field_id(&self, i: usize) -> u8 {
        self.field_ids[i]
    }

    pub fn value_id(&self, i: usize) -> u32 {
        LittleEndian::read_u32(&self.value_ids[i * 4..i * 4 + 4])
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, u32)> + '_ {
        (0..self.len()).map(move |i| (self.field_id(i), self.value_id(i)))
    }

    /// Value id stored for `field_id`.
    ///
    /// Checks the low end, then the high end, then bisects the interior.
    pub fn find(&self, field_id: u8) -> Option<u32> {
        if self.is_empty() {
            return None;
        }

        let mut lo = 0usize;
        let mut hi = self.len() - 1;
        loop {
            let low = self.field_id(lo);
            if low == field_id {
                return Some(self.value_id(lo));
            }
            if low > field_id {
                return None;
            }

            let high = self.field_id(hi);
            if high == field_id {
                return Some(self.value_id(hi));
            }
            if high < field_id {
                return None;
            }

            if hi - lo < 2 {
                return None;
            }

            let mid = lo + (hi - lo) / 2;
            let m = self.field_id(mid);
            if m == field_id {
                return Some(self.value_id(mid));
            }
            if m < field_id {
                lo = mid + 1;
            } else {
                hi = mid - 1;
            }
        }
    }
}
