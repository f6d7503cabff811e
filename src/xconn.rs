//! The narrow X11 collaborator interface (spec §6).
//!
//! Deliberately smaller than `toaruwm::x::core::XConn`, which also
//! grabs keyboards and configures windows: this crate only ever needs
//! to intern atoms, resolve atom names, and fetch window properties,
//! so that's all the trait exposes.

use crate::atom::AtomId;
use crate::error::XResult;

/// A raw, undecoded property reply from the X server.
///
/// `format` follows X11's own convention: 8, 16 or 32 bits per
/// element. `data` is always the little/big-endian-native byte
/// representation the connection returned; decoding into typed cells
/// happens in [`crate::fetch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyReply {
    pub format: u8,
    pub type_: AtomId,
    pub bytes_after: u32,
    pub data: Vec<u8>,
}

/// Abstract connection to an X server, narrowed to exactly the
/// operations the condition engine needs.
pub trait XConn {
    /// Resolve `name` to an atom id, interning it on the server if
    /// it did not already exist (`only_if_exists = false` semantics).
    fn intern_atom(&self, name: &[u8]) -> XResult<AtomId>;

    /// Resolve an atom id back to its name.
    fn atom_name(&self, atom: AtomId) -> XResult<Vec<u8>>;

    /// Fetch up to `length` 32-bit units of `property` on `window`,
    /// starting at `long_offset`. Mirrors `xcb_get_property`'s
    /// signature directly (see `toaruwm::x::core::XConn::get_prop` and
    /// its xcb backend) since the two-phase fetch protocol in
    /// [`crate::fetch`] depends on exactly this shape.
    fn get_property(
        &self,
        window: u32,
        property: AtomId,
        type_filter: Option<AtomId>,
        long_offset: u32,
        long_length: u32,
    ) -> XResult<PropertyReply>;
}

/// Exposed outside unit tests behind `test-util` so integration tests
/// under `tests/` (which link the crate as an ordinary dependency, not
/// its `#[cfg(test)]` build) can drive the full pipeline against a fake
/// connection too.
#[cfg(any(test, feature = "test-util"))]
pub mod mock {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// In-memory fake standing in for a live X connection in tests,
    /// following `toaruwm`'s preference for a hand-written fake over a
    /// mocking framework (see `src/x/tests.rs`).
    ///
    /// Atom interning is sequential starting from 1 (0 is [`crate::atom::NONE`]);
    /// properties are registered ahead of time with [`MockXConn::set_property`].
    pub struct MockXConn {
        names_to_ids: RefCell<HashMap<Vec<u8>, AtomId>>,
        ids_to_names: RefCell<HashMap<AtomId, Vec<u8>>>,
        next_id: RefCell<u32>,
        properties: RefCell<HashMap<(u32, AtomId), PropertyReply>>,
        /// When set, `get_property` always returns this error instead of
        /// looking anything up — used to exercise [`crate::error::FetchError`] paths.
        pub fail_fetch: RefCell<bool>,
    }

    impl MockXConn {
        pub fn new() -> Self {
            MockXConn {
                names_to_ids: RefCell::new(HashMap::new()),
                ids_to_names: RefCell::new(HashMap::new()),
                next_id: RefCell::new(1),
                properties: RefCell::new(HashMap::new()),
                fail_fetch: RefCell::new(false),
            }
        }

        /// Register a decoded property value for `(window, property)`
        /// ahead of a test's `fetch_all` call.
        pub fn set_property(&self, window: u32, property: AtomId, reply: PropertyReply) {
            self.properties.borrow_mut().insert((window, property), reply);
        }

        /// Overwrite an already-registered property, simulating the
        /// window's state changing between two fetch passes — used to
        /// exercise the grow-between-phases invalidation path.
        pub fn mutate_property(&self, window: u32, property: AtomId, reply: PropertyReply) {
            self.properties.borrow_mut().insert((window, property), reply);
        }
    }

    impl Default for MockXConn {
        fn default() -> Self {
            Self::new()
        }
    }

    impl XConn for MockXConn {
        fn intern_atom(&self, name: &[u8]) -> XResult<AtomId> {
            if let Some(id) = self.names_to_ids.borrow().get(name) {
                return Ok(*id);
            }
            let mut next = self.next_id.borrow_mut();
            let id = AtomId(*next);
            *next += 1;
            self.names_to_ids.borrow_mut().insert(name.to_vec(), id);
            self.ids_to_names.borrow_mut().insert(id, name.to_vec());
            Ok(id)
        }

        fn atom_name(&self, atom: AtomId) -> XResult<Vec<u8>> {
            self.ids_to_names
                .borrow()
                .get(&atom)
                .cloned()
                .ok_or_else(|| crate::error::XError::ServerError(format!("no such atom: {:?}", atom)))
        }

        fn get_property(
            &self,
            window: u32,
            property: AtomId,
            _type_filter: Option<AtomId>,
            long_offset: u32,
            long_length: u32,
        ) -> XResult<PropertyReply> {
            if *self.fail_fetch.borrow() {
                return Err(crate::error::XError::ServerError("mock fetch failure".into()));
            }
            let props = self.properties.borrow();
            let reply = props
                .get(&(window, property))
                .ok_or_else(|| crate::error::XError::ServerError("no such property".into()))?;

            let start = (long_offset as usize) * 4;
            let want = (long_length as usize) * 4;
            let total = reply.data.len();
            let end = (start + want).min(total);
            let slice = if start >= total { &[][..] } else { &reply.data[start..end] };
            let bytes_after = total.saturating_sub(start + slice.len()) as u32;

            Ok(PropertyReply {
                format: reply.format,
                type_: reply.type_,
                bytes_after,
                data: slice.to_vec(),
            })
        }
    }
}
