//! The expression tree (spec §3, §4.B): a typed, immutable AST of
//! branches and leaves produced by [`crate::parser`] and consumed by
//! [`crate::matcher`] and [`crate::printer`].
//!
//! The source models this via a "fat typed pointer" union (Design Note
//! §9); here it's a plain tagged `enum`, the idiomatic Rust shape for a
//! closed sum type.

use crate::atom::AtomId;
use crate::window::Predefined;

/// Branch operator. XOR is accepted by the parser (spec §4.C grammar
/// lists `op := "&&" | "||"`, but the printer must round-trip
/// programmatically built XOR trees — see the `XOR` keyword handling
/// in `parser.rs`) and evaluated with strict difference (spec §4.F).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchOp {
    And,
    Or,
    Xor,
}

/// Comparison operator a leaf applies between a target value and its pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Exists,
    Eq,
    Gt,
    Ge,
    Lt,
    Le,
}

/// String match mode, meaningful only when [`CmpOp::Eq`] is in effect
/// (spec §3 invariant: "match mode ... allowed only with `=`").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    Exact,
    StartsWith,
    Contains,
    Wildcard,
    Pcre,
}

/// The leaf's comparison value. `Undetermined` is only legal paired
/// with [`CmpOp::Exists`] — a bare target with no explicit pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    /// Raw pattern bytes. Not `String`: `\xHH`/`\oNN` escapes can
    /// sign-extend into the high-bit range, producing byte values a
    /// valid UTF-8 `String` cannot represent (spec §4.C).
    Str(Vec<u8>),
    Int(i64),
    Undetermined,
}

/// Either a predefined window attribute or a named X11 atom target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Predefined(Predefined),
    Atom(Vec<u8>),
}

/// A single predicate leaf (spec §3 "Leaf").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    pub target: Target,
    /// Query the client window if true, the frame window otherwise.
    pub target_on_client: bool,
    /// Non-negative element index into a multi-valued property;
    /// `-1` means "any element matches".
    pub index: i32,
    pub op: CmpOp,
    pub mode: MatchMode,
    pub case_insensitive: bool,
    pub pattern: Pattern,
    /// Resolved atom id, filled in by [`crate::tracked`]'s postprocess
    /// pass. [`crate::atom::NONE`] before resolution or on failure.
    pub target_id: AtomId,
    /// Dense id assigned by postprocess, used to key the compiled-PCRE
    /// side table in [`crate::tracked::TrackedIndex`] (a compiled
    /// `Regex` can't derive `PartialEq`/`Eq`, so it never lives on the
    /// leaf itself). `u32::MAX` before postprocess runs.
    pub leaf_id: u32,
}

impl Leaf {
    /// A leaf freshly produced by the parser: unresolved, no tracked id yet.
    pub fn new(
        target: Target,
        target_on_client: bool,
        index: i32,
        op: CmpOp,
        mode: MatchMode,
        case_insensitive: bool,
        pattern: Pattern,
    ) -> Self {
        Leaf {
            target,
            target_on_client,
            index,
            op,
            mode,
            case_insensitive,
            pattern,
            target_id: crate::atom::NONE,
            leaf_id: u32::MAX,
        }
    }

    pub fn is_predefined(&self) -> bool {
        matches!(self.target, Target::Predefined(_))
    }
}

/// The expression tree node (spec §3 "Expression tree node").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Unconditional match.
    True,
    Branch {
        op: BranchOp,
        neg: bool,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Leaf {
        neg: bool,
        leaf: Box<Leaf>,
    },
}

impl Expr {
    /// Construction helper combining two subtrees under an operator
    /// (spec §4.B "construction helper combines two subtrees").
    pub fn branch(op: BranchOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Branch { op, neg: false, lhs: Box::new(lhs), rhs: Box::new(rhs) }
    }

    pub fn leaf(leaf: Leaf) -> Expr {
        Expr::Leaf { neg: false, leaf: Box::new(leaf) }
    }

    /// Toggle this node's negation flag in place (double negation cancels).
    pub fn negate(self) -> Expr {
        match self {
            Expr::True => Expr::True,
            Expr::Branch { op, neg, lhs, rhs } => Expr::Branch { op, neg: !neg, lhs, rhs },
            Expr::Leaf { neg, leaf } => Expr::Leaf { neg: !neg, leaf },
        }
    }
}
