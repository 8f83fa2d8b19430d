//! In-memory directory of the content-addressed side stores.
//!
//! Per family: the insertion-ordered key list (what the original layout
//! exposes as the `Keys` dataset) and a digest → file-location map for the
//! value payloads. Reopen rebuilds both from the frame scan before any
//! write, so deduplication spans sessions.

use ahash::AHashMap;
use fc_record::VlFamily;

use crate::digest::Digest;

/// File location of one stored payload.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ValRef {
    pub offset: u64,
    pub len: u64,
}

#[derive(Default)]
struct FamilyIndex {
    keys: Vec<Digest>,
    vals: AHashMap<Digest, ValRef>,
}

#[derive(Default)]
pub(crate) struct VlStore {
    families: [FamilyIndex; 7],
}

impl VlStore {
    fn index(&self, family: VlFamily) -> &FamilyIndex {
        &self.families[family.tag() as usize]
    }

    pub fn contains(&self, family: VlFamily, digest: &Digest) -> bool {
        self.index(family).vals.contains_key(digest)
    }

    /// Register a newly written payload. First write of a digest appends
    /// it to the family's key list; re-registration is a logic error the
    /// caller avoids via `contains`.
    pub fn insert(&mut self, family: VlFamily, digest: Digest, val: ValRef) {
        let index = &mut self.families[family.tag() as usize];
        if index.vals.insert(digest, val).is_none() {
            index.keys.push(digest);
        }
    }

    pub fn lookup(&self, family: VlFamily, digest: &Digest) -> Option<ValRef> {
        self.index(family).vals.get(digest).copied()
    }

    /// Unique values written to this family, in first-write order.
    pub fn keys(&self, family: VlFamily) -> &[Digest] {
        &self.index(family).keys
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::digest_of;

    #[test]
    fn keys_record_first_write_order() {
        let mut store = VlStore::default();
        let a = digest_of(b"a");
        let b = digest_of(b"b");
        store.insert(VlFamily::String, b, ValRef { offset: 10, len: 1 });
        store.insert(VlFamily::String, a, ValRef { offset: 20, len: 1 });
        assert_eq!(store.keys(VlFamily::String), &[b, a]);
    }

    #[test]
    fn duplicate_insert_does_not_grow_keys() {
        let mut store = VlStore::default();
        let d = digest_of(b"x");
        store.insert(VlFamily::Blob, d, ValRef { offset: 10, len: 1 });
        store.insert(VlFamily::Blob, d, ValRef { offset: 30, len: 1 });
        assert_eq!(store.keys(VlFamily::Blob).len(), 1);
        assert!(store.contains(VlFamily::Blob, &d));
    }

    #[test]
    fn families_are_independent() {
        let mut store = VlStore::default();
        let d = digest_of(b"x");
        store.insert(VlFamily::String, d, ValRef { offset: 10, len: 1 });
        assert!(store.contains(VlFamily::String, &d));
        assert!(!store.contains(VlFamily::Blob, &d));
        assert!(store.lookup(VlFamily::Blob, &d).is_none());
        assert_eq!(store.lookup(VlFamily::String, &d).map(|v| v.offset), Some(10));
    }
}
