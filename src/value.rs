//! Typed property value cells (spec §3): the decoded form a raw
//! `GetProperty` reply is turned into before the matcher ever looks at it.
//!
//! Numeric cells use small-vector-inline-then-heap storage — up to four
//! values live inline, matching the common case (a single `CARDINAL`,
//! or a four-element `WM_HINTS`) without allocating.

const INLINE_CAP: usize = 4;

/// Up to [`INLINE_CAP`] `i64`s stored inline; anything longer spills to
/// a heap `Vec`. No `smallvec`-style crate appears anywhere in the
/// retrieved corpus for this, so the inline/heap split is hand-rolled
/// rather than pulled in from an unused dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NumCells {
    Inline { buf: [i64; INLINE_CAP], len: u8 },
    Heap(Vec<i64>),
}

impl NumCells {
    pub fn from_slice(values: &[i64]) -> Self {
        if values.len() <= INLINE_CAP {
            let mut buf = [0i64; INLINE_CAP];
            buf[..values.len()].copy_from_slice(values);
            NumCells::Inline { buf, len: values.len() as u8 }
        } else {
            NumCells::Heap(values.to_vec())
        }
    }

    pub fn as_slice(&self) -> &[i64] {
        match self {
            NumCells::Inline { buf, len } => &buf[..*len as usize],
            NumCells::Heap(v) => v.as_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<i64> {
        self.as_slice().get(index).copied()
    }
}

/// The discriminant for a decoded property cell, following the three
/// kinds `c2.c`'s `c2_match_once_leaf_string`/`_int` distinguish:
/// a `STRING`/`UTF8_STRING` list of byte strings, a numeric list
/// (`CARDINAL`/`INTEGER`/format-8/16/32), or an `ATOM` list (numeric
/// ids that also carry resolvable names).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Strings(Vec<Vec<u8>>),
    Numbers(NumCells),
    Atoms(Vec<crate::atom::AtomId>),
}

/// A single tracked property's decoded, possibly-stale value.
///
/// `valid = false` means the last fetch failed or the cell was
/// invalidated (grow-between-phases, resolve failure) — the matcher
/// treats an invalid cell as if the property did not exist. `needs_update`
/// is the dirty flag [`crate::fetch::mark_dirty`] sets from a
/// `PropertyNotify`-derived call and [`crate::fetch::fetch_all`] clears
/// once a fetch (successful or not) has run for this cell.
#[derive(Debug, Clone)]
pub struct PropertyCell {
    pub value: Option<PropertyValue>,
    pub valid: bool,
    pub needs_update: bool,
}

impl PropertyCell {
    /// A cell for a window that has never been fetched: invalid, and
    /// dirty so the first `fetch_all` pass picks it up.
    pub fn empty() -> Self {
        PropertyCell { value: None, valid: false, needs_update: true }
    }

    pub fn invalidate(&mut self) {
        self.value = None;
        self.valid = false;
    }

    pub fn set(&mut self, value: PropertyValue) {
        self.value = Some(value);
        self.valid = true;
    }

    /// Items for `Numbers`/`Atoms`, bytes for `Strings` (spec §3
    /// "Property value cell"). `None` when the cell holds nothing.
    pub fn length(&self) -> Option<usize> {
        match &self.value {
            Some(PropertyValue::Strings(items)) => Some(items.iter().map(|s| s.len() + 1).sum()),
            Some(PropertyValue::Numbers(n)) => Some(n.len()),
            Some(PropertyValue::Atoms(a)) => Some(a.len()),
            None => None,
        }
    }
}

impl Default for PropertyCell {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_storage_up_to_four() {
        let cells = NumCells::from_slice(&[1, 2, 3, 4]);
        assert!(matches!(cells, NumCells::Inline { len: 4, .. }));
        assert_eq!(cells.as_slice(), &[1, 2, 3, 4]);
    }

    #[test]
    fn heap_storage_beyond_four() {
        let cells = NumCells::from_slice(&[1, 2, 3, 4, 5]);
        assert!(matches!(cells, NumCells::Heap(_)));
        assert_eq!(cells.as_slice(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn invalidate_clears_value() {
        let mut cell = PropertyCell::empty();
        cell.set(PropertyValue::Numbers(NumCells::from_slice(&[7])));
        assert!(cell.valid);
        cell.invalidate();
        assert!(!cell.valid);
        assert!(cell.value.is_none());
    }

    #[test]
    fn fresh_cell_is_dirty() {
        assert!(PropertyCell::empty().needs_update);
    }

    #[test]
    fn length_counts_bytes_for_strings_and_items_for_others() {
        let mut cell = PropertyCell::empty();
        cell.set(PropertyValue::Strings(vec![b"ab".to_vec(), b"c".to_vec()]));
        assert_eq!(cell.length(), Some(3 + 2));

        let mut cell = PropertyCell::empty();
        cell.set(PropertyValue::Numbers(NumCells::from_slice(&[1, 2, 3])));
        assert_eq!(cell.length(), Some(3));
    }
}
