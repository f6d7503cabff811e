//! Tracked-property index (spec §4.D): the postprocess pass that
//! resolves atom leaves, deduplicates `(atom, on_client)` pairs into
//! dense ids, tracks each entry's required index range, and compiles
//! PCRE patterns ahead of matching.

use crate::atom::{AtomId, Catalogue};
use crate::ast::{CmpOp, Expr, Leaf, MatchMode, Target};
use crate::xconn::XConn;
use std::collections::HashMap;

/// `(atom, on_client)` — unique across every leaf from every condition
/// that refers to an X11 property (spec §3 "Tracked-property key").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackedKey {
    pub atom: AtomId,
    pub on_client: bool,
}

/// A distinct tracked property: its key, dense id, and the widest
/// index any leaf has requested against it (spec §3 "Tracked-property entry").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackedEntry {
    pub key: TrackedKey,
    pub id: usize,
    /// Highest positive index referenced, or `-1` once any leaf has
    /// requested the wildcard index (permanent once set — spec §4.D.3).
    pub max_indices: i32,
}

/// The dense `(atom, on_client) → id` table plus, when the `pcre`
/// feature is enabled, a side table of compiled regexes keyed by each
/// leaf's [`Leaf::leaf_id`] — a compiled `Regex` can't derive
/// `PartialEq`/`Eq`, so it never lives on the leaf itself.
#[derive(Debug, Default)]
pub struct TrackedIndex {
    keys: HashMap<TrackedKey, usize>,
    entries: Vec<TrackedEntry>,
    next_leaf_id: u32,
    #[cfg(feature = "pcre")]
    compiled: HashMap<u32, regex::Regex>,
}

impl TrackedIndex {
    pub fn new() -> Self {
        TrackedIndex {
            keys: HashMap::new(),
            entries: Vec::new(),
            next_leaf_id: 0,
            #[cfg(feature = "pcre")]
            compiled: HashMap::new(),
        }
    }

    pub fn entries(&self) -> &[TrackedEntry] {
        &self.entries
    }

    pub fn entry(&self, id: usize) -> Option<&TrackedEntry> {
        self.entries.get(id)
    }

    pub fn lookup(&self, key: TrackedKey) -> Option<usize> {
        self.keys.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn next_leaf_id(&mut self) -> u32 {
        let id = self.next_leaf_id;
        self.next_leaf_id += 1;
        id
    }

    /// Register `key` against `index`, assigning a new dense id on
    /// first sight (spec §4.D.2). `max_indices` only ever grows toward
    /// `-1`; once it reaches `-1` it is never overwritten (spec §4.D.3).
    fn register(&mut self, key: TrackedKey, index: i32) -> usize {
        if let Some(&id) = self.keys.get(&key) {
            let entry = &mut self.entries[id];
            if entry.max_indices != -1 {
                entry.max_indices = if index == -1 { -1 } else { entry.max_indices.max(index) };
            }
            id
        } else {
            let id = self.entries.len();
            self.entries.push(TrackedEntry { key, id, max_indices: index });
            self.keys.insert(key, id);
            id
        }
    }

    #[cfg(feature = "pcre")]
    pub fn compiled_pattern(&self, leaf_id: u32) -> Option<&regex::Regex> {
        self.compiled.get(&leaf_id)
    }

    #[cfg(not(feature = "pcre"))]
    pub fn compiled_pattern(&self, _leaf_id: u32) -> Option<&()> {
        None
    }
}

/// Walk every leaf in `expr`, resolving atom targets and registering
/// tracked properties (spec §4.D). Idempotent: a leaf already carrying
/// a `leaf_id` was processed by an earlier call and is skipped,
/// satisfying "running it twice over the same tree yields the same
/// index and the same IDs in the same order" (spec §4.D).
pub fn postprocess<X: XConn>(expr: &mut Expr, catalogue: &mut Catalogue, xconn: &X, index: &mut TrackedIndex) {
    match expr {
        Expr::True => {}
        Expr::Branch { lhs, rhs, .. } => {
            postprocess(lhs, catalogue, xconn, index);
            postprocess(rhs, catalogue, xconn, index);
        }
        Expr::Leaf { leaf, .. } => postprocess_leaf(leaf, catalogue, xconn, index),
    }
}

fn postprocess_leaf<X: XConn>(leaf: &mut Leaf, catalogue: &mut Catalogue, xconn: &X, index: &mut TrackedIndex) {
    if leaf.leaf_id != u32::MAX {
        return;
    }
    leaf.leaf_id = index.next_leaf_id();

    if let Target::Atom(name) = &leaf.target {
        if name.iter().any(|b| b.is_ascii_lowercase()) {
            tracing::warn!(
                name = %String::from_utf8_lossy(name),
                "rule references a lower-case atom name; atom convention is upper-case"
            );
        }

        let resolved = match catalogue.lookup(name) {
            Some(id) => Some(id),
            None => match xconn.intern_atom(name) {
                Ok(id) => {
                    catalogue.insert(name, id);
                    Some(id)
                }
                Err(e) => {
                    let err = crate::error::ResolveError {
                        target: String::from_utf8_lossy(name).into_owned(),
                        cause: e.to_string(),
                    };
                    tracing::debug!(error = %err, "failed to resolve atom target");
                    None
                }
            },
        };

        match resolved {
            Some(id) => {
                leaf.target_id = id;
                let key = TrackedKey { atom: id, on_client: leaf.target_on_client };
                index.register(key, leaf.index);
            }
            None => leaf.target_id = crate::atom::NONE,
        }
    }

    if leaf.mode == MatchMode::Pcre && matches!(leaf.op, CmpOp::Eq) {
        compile_pcre(leaf, index);
    }
}

#[cfg(feature = "pcre")]
fn compile_pcre(leaf: &mut Leaf, index: &mut TrackedIndex) {
    let crate::ast::Pattern::Str(bytes) = &leaf.pattern else {
        return;
    };
    let text = String::from_utf8_lossy(bytes);
    let built = regex::RegexBuilder::new(&text).case_insensitive(leaf.case_insensitive).build();
    match built {
        Ok(re) => {
            index.compiled.insert(leaf.leaf_id, re);
        }
        Err(e) => {
            let err = crate::error::RegexCompileError { pattern: text.into_owned(), cause: e.to_string() };
            tracing::debug!(error = %err, "failed to compile PCRE pattern");
            leaf.target_id = crate::atom::NONE;
        }
    }
}

#[cfg(not(feature = "pcre"))]
fn compile_pcre(leaf: &mut Leaf, _index: &mut TrackedIndex) {
    tracing::debug!("PCRE pattern present but the 'pcre' feature is disabled");
    leaf.target_id = crate::atom::NONE;
}
