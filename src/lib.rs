//! Window-matching rule engine core: the condition language parser,
//! the tracked-property index, and the matcher, for an X11 compositor
//! deciding which user-defined rule applies to a window.
//!
//! This crate consumes the compositor's X11 connection only through the
//! narrow [`xconn::XConn`] trait — it never owns a connection, a window,
//! or a rendering pipeline. See `DESIGN.md` for how each module maps
//! back to the component it's grounded on.

pub mod ast;
pub mod atom;
pub mod condition;
pub mod error;
pub mod fetch;
pub mod matcher;
pub mod parser;
pub mod printer;
pub mod tracked;
pub mod value;
pub mod window;
pub mod xconn;

pub use ast::{BranchOp, CmpOp, Expr, Leaf, MatchMode, Pattern, Target};
pub use atom::{AtomId, Catalogue};
pub use condition::{Condition, ConditionList};
pub use error::{FetchError, ParseError, RegexCompileError, ResolveError, XError, XResult};
pub use fetch::WindowProperties;
pub use matcher::MatchState;
pub use tracked::{TrackedEntry, TrackedIndex, TrackedKey};
pub use value::{NumCells, PropertyCell, PropertyValue};
pub use window::{Geometry, Predefined, WindowAttrs, WindowTypeFlags};
pub use xconn::{PropertyReply, XConn};
