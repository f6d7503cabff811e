//! Window property fetcher (spec §4.E): the two-phase `GetProperty`
//! pipeline that sizes unknown-length properties, re-requests them, and
//! decodes every reply into a typed [`PropertyCell`].
//!
//! Mirrors the batching shape of `toaruwm::x::core::XConn::get_prop`
//! plus the reply-triage step `original_source/src/c2.c`'s
//! `c2_window_state_update` performs: issue every dirty request before
//! blocking on any one reply, so the X server pipelines them, then
//! collect a second, smaller batch only for properties that turned out
//! to be longer than guessed.

use crate::atom::{self, AtomId};
use crate::error::FetchError;
use crate::atom::Catalogue;
use crate::tracked::{TrackedEntry, TrackedIndex, TrackedKey};
use crate::value::{NumCells, PropertyCell, PropertyValue};
use crate::xconn::{PropertyReply, XConn};
use byteorder::{ByteOrder, NativeEndian};

/// Per-window store of decoded property cells, indexed by a tracked
/// property's dense id. One of these lives on each window record the
/// compositor owns; this crate never keeps window identity itself
/// (spec §1 Non-goals: "does not cache by window-identity across sessions").
#[derive(Debug, Default)]
pub struct WindowProperties {
    cells: Vec<PropertyCell>,
}

impl WindowProperties {
    pub fn new() -> Self {
        WindowProperties { cells: Vec::new() }
    }

    /// Grow to cover every entry currently known to `index`. New slots
    /// start dirty (spec: a newly tracked property needs its first fetch).
    pub fn sync_capacity(&mut self, index: &TrackedIndex) {
        if self.cells.len() < index.len() {
            self.cells.resize_with(index.len(), PropertyCell::empty);
        }
    }

    pub fn cell(&self, id: usize) -> Option<&PropertyCell> {
        self.cells.get(id)
    }

    /// Locate the property (if tracked) and set its dirty flag; this is
    /// how a `PropertyNotify` stream is filtered cheaply (spec §4.E
    /// "Dirtying" — properties that aren't tracked are silently ignored).
    pub fn mark_dirty(&mut self, index: &TrackedIndex, atom: AtomId, on_client: bool) {
        if let Some(id) = index.lookup(TrackedKey { atom, on_client }) {
            self.sync_capacity(index);
            if let Some(cell) = self.cells.get_mut(id) {
                cell.needs_update = true;
            }
        }
    }
}

/// Run the full two-phase fetch for one window pair. `client_win` and
/// `frame_win` may be the same id if the window has no separate frame.
pub fn fetch_all<X: XConn>(
    index: &TrackedIndex,
    props: &mut WindowProperties,
    catalogue: &mut Catalogue,
    xconn: &X,
    client_win: u32,
    frame_win: u32,
) {
    props.sync_capacity(index);

    // Phase 1: issue every dirty request before decoding any reply, so
    // the connection pipelines them concurrently with our own work
    // (spec §5: "enqueues requests in one batch").
    struct Phase1Reply {
        id: usize,
        window: u32,
        reply: PropertyReply,
    }
    let mut replies = Vec::new();
    for entry in index.entries() {
        if !props.cells[entry.id].needs_update {
            continue;
        }
        let window = target_window(entry, client_win, frame_win);
        let length = sizing_length(entry);
        match xconn.get_property(window, entry.key.atom, None, 0, length) {
            Ok(reply) => replies.push(Phase1Reply { id: entry.id, window, reply }),
            Err(e) => {
                let err = FetchError::Server(e);
                tracing::debug!(atom = entry.key.atom.0, error = %err, "phase 1 GetProperty failed");
                let cell = &mut props.cells[entry.id];
                cell.invalidate();
                cell.needs_update = false;
            }
        }
    }

    // Phase 2a: triage. A reply that's already complete is decoded now;
    // one that's longer than our guess gets queued for a second request.
    struct Phase2Request {
        id: usize,
        window: u32,
        atom: AtomId,
        length: u32,
    }
    let mut refetch = Vec::new();
    for Phase1Reply { id, window, reply } in replies {
        let entry = &index.entries()[id];
        let complete = reply.bytes_after == 0 || (!is_string_type(reply.type_, catalogue) && entry.max_indices >= 0);
        if complete {
            decode_into(&mut props.cells[id], &reply, catalogue, xconn);
            props.cells[id].needs_update = false;
        } else {
            let total_bytes = reply.data.len() as u64 + reply.bytes_after as u64;
            let length = ((total_bytes + 3) / 4) as u32;
            refetch.push(Phase2Request { id, window, atom: entry.key.atom, length });
        }
    }

    // Phase 2b: a second, smaller batch for whatever grew past our guess.
    // Should the property grow *again* here, the cell is invalidated and
    // logged rather than retried a third time (spec §4.E, §9 Open Question).
    for Phase2Request { id, window, atom, length } in refetch {
        match xconn.get_property(window, atom, None, 0, length) {
            Ok(reply) if reply.bytes_after == 0 => {
                decode_into(&mut props.cells[id], &reply, catalogue, xconn);
                props.cells[id].needs_update = false;
            }
            Ok(_) => {
                let err = FetchError::GrewDuringRefetch;
                tracing::error!(atom = atom.0, error = %err, "invalidating cell");
                let cell = &mut props.cells[id];
                cell.invalidate();
                cell.needs_update = false;
            }
            Err(e) => {
                let err = FetchError::Server(e);
                tracing::debug!(atom = atom.0, error = %err, "phase 2b GetProperty failed");
                let cell = &mut props.cells[id];
                cell.invalidate();
                cell.needs_update = false;
            }
        }
    }
}

fn target_window(entry: &TrackedEntry, client_win: u32, frame_win: u32) -> u32 {
    if entry.key.on_client {
        client_win
    } else {
        frame_win
    }
}

/// Phase 1's request length, in 4-byte units (spec §4.E): enough units
/// to cover every indexed element a leaf asked for, or a metadata-only
/// probe (`0`) when only existence/wildcard matters.
fn sizing_length(entry: &TrackedEntry) -> u32 {
    if entry.max_indices >= 0 {
        entry.max_indices as u32 + 1
    } else {
        0
    }
}

fn is_string_type(type_: AtomId, catalogue: &Catalogue) -> bool {
    if type_ == atom::XA_STRING {
        return true;
    }
    matches!(catalogue.name_of(type_), Some(name) if name == b"UTF8_STRING" || name == b"C_STRING")
}

/// Decode one `GetProperty` reply into `cell` (spec §4.E "Decoding").
fn decode_into<X: XConn>(cell: &mut PropertyCell, reply: &PropertyReply, catalogue: &mut Catalogue, xconn: &X) {
    if reply.type_ == atom::NONE {
        cell.invalidate();
        cell.needs_update = false;
        return;
    }

    if is_string_type(reply.type_, catalogue) {
        if reply.format != 8 {
            cell.invalidate();
            return;
        }
        let mut bytes = reply.data.clone();
        if bytes.last() != Some(&0) {
            bytes.push(0);
        }
        cell.set(PropertyValue::Strings(split_nul(&bytes)));
        return;
    }

    let step = match reply.format {
        8 => 1,
        16 => 2,
        32 => 4,
        other => {
            tracing::debug!(format = other, "unsupported property format, invalidating cell");
            cell.invalidate();
            return;
        }
    };

    let n = reply.data.len() / step;
    let signed = reply.type_ == atom::XA_INTEGER;
    let mut values = Vec::with_capacity(n);
    for chunk in reply.data.chunks_exact(step) {
        values.push(read_item(chunk, signed));
    }

    if reply.type_ == atom::XA_ATOM {
        let atoms: Vec<AtomId> = values.iter().map(|&v| AtomId(v as u32)).collect();
        // Prefetch every atom's name now so the matcher can resolve it
        // synchronously later (spec §4.E: "prefetch each atom's name
        // into the catalogue so the matcher can look up names synchronously").
        for &a in &atoms {
            if catalogue.name_of(a).is_none() {
                if let Ok(name) = xconn.atom_name(a) {
                    catalogue.insert(&name, a);
                }
            }
        }
        cell.set(PropertyValue::Atoms(atoms));
    } else {
        cell.set(PropertyValue::Numbers(NumCells::from_slice(&values)));
    }
}

fn read_item(chunk: &[u8], signed: bool) -> i64 {
    match (chunk.len(), signed) {
        (1, true) => chunk[0] as i8 as i64,
        (1, false) => chunk[0] as i64,
        (2, true) => NativeEndian::read_i16(chunk) as i64,
        (2, false) => NativeEndian::read_u16(chunk) as i64,
        (4, true) => NativeEndian::read_i32(chunk) as i64,
        (4, false) => NativeEndian::read_u32(chunk) as i64,
        _ => unreachable!("step is always 1, 2 or 4"),
    }
}

/// Split a NUL-terminated buffer into its NUL-separated byte strings,
/// dropping the single trailing empty segment the terminator produces.
fn split_nul(bytes: &[u8]) -> Vec<Vec<u8>> {
    let mut out: Vec<Vec<u8>> = bytes.split(|&b| b == 0).map(|s| s.to_vec()).collect();
    if out.last().map_or(false, |s| s.is_empty()) {
        out.pop();
    }
    out
}
