//! The atom catalogue (spec §4.A): a bidirectional name↔id cache with a
//! fixed set of well-known atoms pre-interned at construction via
//! [`Catalogue::with_well_known`].
//!
//! Generalizes `toaruwm::x::atom::Atoms`, whose `known`/`interned` maps
//! are keyed by a fixed `Atom` enum, into a fully dynamic string-keyed
//! cache — rule text can name any atom the compositor has never heard
//! of, so the enum-keyed shortcut the teacher uses doesn't fit here.

use std::collections::HashMap;

use crate::xconn::XConn;

/// Numeric atom identifier, as returned by the X server.
///
/// Newtype mirroring `toaruwm`'s `Xid(pub u32)` pattern from its newer
/// snapshot — kept distinct from a bare `u32` so a raw window id can
/// never be passed where an atom is expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AtomId(pub u32);

/// Sentinel for "no atom" / "failed to resolve" — `X11`'s `None` atom.
pub const NONE: AtomId = AtomId(0);

/// Fixed, protocol-level predefined atoms (X11 core protocol §2.7,
/// `<X11/Xatom.h>`). Unlike every other atom this catalogue deals with,
/// these ids never need a server round-trip to resolve — they are the
/// same on every X11 server — so [`crate::fetch`]'s type-discrimination
/// checks them directly instead of going through [`Catalogue::lookup`].
pub const XA_ATOM: AtomId = AtomId(4);
pub const XA_INTEGER: AtomId = AtomId(19);
pub const XA_STRING: AtomId = AtomId(31);

/// Longest atom name this catalogue will intern. Chosen generously
/// above anything ICCCM/EWMH actually defines; rejects runaway rule
/// text rather than growing the tables unbounded.
pub const MAX_ATOM_NAME_LEN: usize = 256;

/// Well-known atom names pre-interned at construction (spec §4.A: "a
/// fixed table of ≈40 well-known atoms ... is pre-interned at
/// construction"), so the common predefined-attribute and property-type
/// lookups never need a round trip before the first match. Mirrors the
/// table of names baked into `toaruwm::x::atom::Atom`.
///
/// `UTF8_STRING`/`C_STRING` are included even though no leaf ever names
/// them as a *target* — they're property *types* [`crate::fetch`]'s
/// `is_string_type` must recognize by name, and a type atom is only
/// ever resolved from a numeric id, never looked up by name from rule
/// text. Pre-interning them here is what makes that name lookup succeed.
pub const WELL_KNOWN: &[&str] = &[
    "WM_NAME",
    "WM_CLASS",
    "WM_CLASS_GENERAL",
    "WM_CLASS_INSTANCE",
    "WM_HINTS",
    "WM_PROTOCOLS",
    "WM_STATE",
    "WM_TRANSIENT_FOR",
    "WM_ICON_NAME",
    "WM_NORMAL_HINTS",
    "WM_SIZE_HINTS",
    "WM_WINDOW_ROLE",
    "UTF8_STRING",
    "C_STRING",
    "COMPOUND_TEXT",
    "_NET_WM_NAME",
    "_NET_WM_ICON_NAME",
    "_NET_WM_STATE",
    "_NET_WM_STATE_FULLSCREEN",
    "_NET_WM_STATE_HIDDEN",
    "_NET_WM_STATE_ABOVE",
    "_NET_WM_STATE_BELOW",
    "_NET_WM_STATE_STICKY",
    "_NET_WM_STATE_MODAL",
    "_NET_WM_STATE_DEMANDS_ATTENTION",
    "_NET_WM_WINDOW_OPACITY",
    "_NET_WM_WINDOW_TYPE",
    "_NET_WM_WINDOW_TYPE_NORMAL",
    "_NET_WM_WINDOW_TYPE_DIALOG",
    "_NET_WM_WINDOW_TYPE_UTILITY",
    "_NET_WM_WINDOW_TYPE_TOOLBAR",
    "_NET_WM_WINDOW_TYPE_SPLASH",
    "_NET_WM_WINDOW_TYPE_DOCK",
    "_NET_WM_WINDOW_TYPE_DESKTOP",
    "_NET_WM_WINDOW_TYPE_MENU",
    "_NET_WM_WINDOW_TYPE_POPUP_MENU",
    "_NET_WM_WINDOW_TYPE_TOOLTIP",
    "_NET_WM_WINDOW_TYPE_NOTIFICATION",
    "_NET_WM_PID",
    "_NET_WM_DESKTOP",
    "_NET_FRAME_EXTENTS",
    "_GTK_FRAME_EXTENTS",
    "_NET_CLIENT_LIST",
    "_NET_ACTIVE_WINDOW",
];

/// Bidirectional atom name ↔ id cache.
///
/// `forward` and `inverse` are always kept in sync by [`Catalogue::insert`]
/// — every entry reachable from one map is reachable from the other.
#[derive(Debug, Default)]
pub struct Catalogue {
    forward: HashMap<Box<[u8]>, AtomId>,
    inverse: HashMap<AtomId, Box<[u8]>>,
}

impl Catalogue {
    /// An empty catalogue with nothing pre-interned.
    pub fn new() -> Self {
        Catalogue {
            forward: HashMap::new(),
            inverse: HashMap::new(),
        }
    }

    /// A catalogue with [`WELL_KNOWN`] pre-interned via `xconn` (spec
    /// §4.A). This is the constructor real callers should use — it's
    /// what makes type-discrimination in [`crate::fetch::is_string_type`]
    /// (`UTF8_STRING`/`C_STRING`) and the predefined-attribute atoms
    /// resolve without a round trip on the first matched window. A
    /// server error interning any one name is logged and skipped; it
    /// doesn't fail construction of the rest.
    pub fn with_well_known<X: XConn>(xconn: &X) -> Self {
        let mut cat = Self::new();
        for &name in WELL_KNOWN {
            match xconn.intern_atom(name.as_bytes()) {
                Ok(id) => {
                    cat.insert(name.as_bytes(), id);
                }
                Err(e) => {
                    tracing::debug!(name = %name, error = %e, "failed to pre-intern well-known atom");
                }
            }
        }
        cat
    }

    /// Look up a cached atom id for `name` without touching the X
    /// connection. Returns `None` on a cache miss.
    pub fn lookup(&self, name: &[u8]) -> Option<AtomId> {
        self.forward.get(name).copied()
    }

    /// Look up the cached name for `id`. Returns `None` on a cache miss.
    pub fn name_of(&self, id: AtomId) -> Option<&[u8]> {
        self.inverse.get(&id).map(|b| &**b)
    }

    /// Record a resolved `(name, id)` pair in both directions.
    ///
    /// Names longer than [`MAX_ATOM_NAME_LEN`] are rejected (returns
    /// `false`) rather than silently truncated, since a truncated atom
    /// name could alias onto an unrelated, shorter one.
    pub fn insert(&mut self, name: &[u8], id: AtomId) -> bool {
        if name.len() > MAX_ATOM_NAME_LEN {
            return false;
        }
        let boxed: Box<[u8]> = name.into();
        self.forward.insert(boxed.clone(), id);
        self.inverse.insert(id, boxed);
        true
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xconn::mock::MockXConn;

    #[test]
    fn with_well_known_preinterns_string_class_atoms() {
        let xconn = MockXConn::new();
        let cat = Catalogue::with_well_known(&xconn);
        let utf8 = cat.lookup(b"UTF8_STRING").expect("UTF8_STRING should be pre-interned");
        assert_eq!(cat.name_of(utf8), Some(&b"UTF8_STRING"[..]));
        let cstr = cat.lookup(b"C_STRING").expect("C_STRING should be pre-interned");
        assert_eq!(cat.name_of(cstr), Some(&b"C_STRING"[..]));
    }

    #[test]
    fn with_well_known_covers_every_table_entry() {
        let xconn = MockXConn::new();
        let cat = Catalogue::with_well_known(&xconn);
        for &name in WELL_KNOWN {
            assert!(cat.lookup(name.as_bytes()).is_some(), "{} was not pre-interned", name);
        }
    }

    #[test]
    fn insert_and_lookup_roundtrip() {
        let mut cat = Catalogue::new();
        assert!(cat.insert(b"_NET_WM_STATE", AtomId(42)));
        assert_eq!(cat.lookup(b"_NET_WM_STATE"), Some(AtomId(42)));
        assert_eq!(cat.name_of(AtomId(42)), Some(&b"_NET_WM_STATE"[..]));
    }

    #[test]
    fn miss_returns_none() {
        let cat = Catalogue::new();
        assert_eq!(cat.lookup(b"NOT_INTERNED"), None);
    }

    #[test]
    fn overlong_name_rejected() {
        let mut cat = Catalogue::new();
        let long_name = vec![b'A'; MAX_ATOM_NAME_LEN + 1];
        assert!(!cat.insert(&long_name, AtomId(1)));
        assert_eq!(cat.len(), 0);
    }

    #[test]
    fn reinsert_overwrites_both_directions() {
        let mut cat = Catalogue::new();
        cat.insert(b"FOO", AtomId(1));
        cat.insert(b"FOO", AtomId(2));
        assert_eq!(cat.lookup(b"FOO"), Some(AtomId(2)));
        assert_eq!(cat.name_of(AtomId(2)), Some(&b"FOO"[..]));
    }
}
