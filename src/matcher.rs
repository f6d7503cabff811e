//! The matcher (spec §4.F): evaluates a parsed [`Expr`] against a
//! window's predefined attributes and its fetched property cells.
//!
//! No error from anywhere downstream ever surfaces here — an unresolved
//! atom, an invalid cell, a failed regex compile all show up simply as
//! a leaf that evaluates to `false` (spec §7: "no error is propagated
//! upward through the matcher"). This module therefore never returns a
//! `Result`; `eval` is a total, pure function of its inputs (spec §8
//! "Matcher determinism").

use crate::ast::{BranchOp, CmpOp, Expr, Leaf, MatchMode, Pattern, Target};
use crate::atom::Catalogue;
use crate::fetch::WindowProperties;
use crate::tracked::{TrackedIndex, TrackedKey};
use crate::value::{NumCells, PropertyValue};
use crate::window::{Predefined, WindowAttrs};

/// Everything the matcher needs beyond the tree and the window itself:
/// the catalogue (to resolve atom-valued property items to names) and
/// the tracked-property index (to find a leaf's cell, and its compiled
/// PCRE pattern). Spec §4.F: "Input: a state + window record + tree root."
pub struct MatchState<'a> {
    pub catalogue: &'a Catalogue,
    pub index: &'a TrackedIndex,
}

/// Evaluate `expr` against `attrs`/`props`. Branch evaluation visits the
/// left child first; `AND`/`OR` short-circuit (Rust's `&&`/`||` already
/// do this); `XOR` is strict difference and always evaluates both sides
/// (spec §5 "Ordering guarantees", §4.F).
pub fn eval(expr: &Expr, state: &MatchState, attrs: &WindowAttrs, props: &WindowProperties) -> bool {
    match expr {
        Expr::True => true,
        Expr::Branch { op, neg, lhs, rhs } => {
            let result = match op {
                BranchOp::And => eval(lhs, state, attrs, props) && eval(rhs, state, attrs, props),
                BranchOp::Or => eval(lhs, state, attrs, props) || eval(rhs, state, attrs, props),
                BranchOp::Xor => eval(lhs, state, attrs, props) != eval(rhs, state, attrs, props),
            };
            result ^ neg
        }
        Expr::Leaf { neg, leaf } => eval_leaf(leaf, state, attrs, props) ^ neg,
    }
}

fn eval_leaf(leaf: &Leaf, state: &MatchState, attrs: &WindowAttrs, props: &WindowProperties) -> bool {
    match &leaf.target {
        Target::Predefined(p) => eval_predefined(*p, leaf, state, attrs),
        Target::Atom(_) => eval_atom(leaf, state, props),
    }
}

fn eval_predefined(p: Predefined, leaf: &Leaf, state: &MatchState, attrs: &WindowAttrs) -> bool {
    // Deprecated predefined attributes always evaluate false, for any
    // operator (spec §4.F predefined-attribute table, §9 design note).
    if p.is_deprecated() {
        return false;
    }

    if p == Predefined::WindowType {
        return eval_window_type(leaf, state, attrs);
    }

    if matches!(leaf.op, CmpOp::Exists) {
        return if p.is_string() {
            !predefined_string(p, attrs).is_empty()
        } else {
            predefined_numeric(p, attrs) != 0
        };
    }

    if p.is_string() {
        match &leaf.pattern {
            Pattern::Str(_) => string_matches(leaf, state, predefined_string(p, attrs).as_bytes()),
            _ => false,
        }
    } else {
        match leaf.pattern {
            Pattern::Int(pat) => numeric_cmp(leaf.op, predefined_numeric(p, attrs), pat),
            _ => false,
        }
    }
}

fn eval_window_type(leaf: &Leaf, state: &MatchState, attrs: &WindowAttrs) -> bool {
    let names = attrs.window_type.names();
    if matches!(leaf.op, CmpOp::Exists) {
        return !names.is_empty();
    }
    match &leaf.pattern {
        Pattern::Str(_) => names.iter().any(|n| string_matches(leaf, state, n.as_bytes())),
        _ => false,
    }
}

fn predefined_numeric(p: Predefined, attrs: &WindowAttrs) -> i64 {
    use Predefined::*;
    match p {
        X => attrs.geometry.x as i64,
        Y => attrs.geometry.y as i64,
        X2 => attrs.x2() as i64,
        Y2 => attrs.y2() as i64,
        Width => attrs.geometry.width as i64,
        Height => attrs.geometry.height as i64,
        Widthb => (attrs.geometry.width + 2 * attrs.geometry.border_width) as i64,
        Heightb => (attrs.geometry.height + 2 * attrs.geometry.border_width) as i64,
        BorderWidth => attrs.geometry.border_width as i64,
        Fullscreen => attrs.fullscreen as i64,
        OverrideRedirect => attrs.override_redirect as i64,
        Argb => attrs.argb as i64,
        Focused => attrs.focused as i64,
        GroupFocused => attrs.group_focused as i64,
        Wmwin => attrs.wmwin as i64,
        BoundingShaped => attrs.bounding_shaped as i64,
        RoundedCorners => attrs.rounded_corners as i64,
        WindowType | Name | ClassG | ClassI | Role | Id | Client | Leader => {
            unreachable!("string/deprecated attributes never reach predefined_numeric")
        }
    }
}

fn predefined_string(p: Predefined, attrs: &WindowAttrs) -> &str {
    use Predefined::*;
    match p {
        Name => &attrs.name,
        ClassG => &attrs.class_g,
        ClassI => &attrs.class_i,
        Role => &attrs.role,
        _ => unreachable!("only the four string attributes (window_type handled separately) reach here"),
    }
}

fn eval_atom(leaf: &Leaf, state: &MatchState, props: &WindowProperties) -> bool {
    if leaf.target_id == crate::atom::NONE {
        return false;
    }
    let key = TrackedKey { atom: leaf.target_id, on_client: leaf.target_on_client };
    let Some(id) = state.index.lookup(key) else {
        return false;
    };
    let Some(cell) = props.cell(id) else {
        return false;
    };
    if !cell.valid {
        return false;
    }
    if matches!(leaf.op, CmpOp::Exists) {
        // "EXISTS on an X11 integer property returns true whenever the
        // cell is valid" (spec §4.F) — generalizes the same way for
        // string/atom cells: existence is validity, full stop.
        return true;
    }

    match &cell.value {
        Some(PropertyValue::Strings(items)) => eval_strings(leaf, state, items),
        Some(PropertyValue::Numbers(nums)) => eval_numbers(leaf, nums),
        Some(PropertyValue::Atoms(atoms)) => eval_atoms(leaf, state, atoms),
        None => false,
    }
}

fn eval_numbers(leaf: &Leaf, nums: &NumCells) -> bool {
    let Pattern::Int(pat) = leaf.pattern else {
        return false;
    };
    if leaf.index >= 0 {
        nums.get(leaf.index as usize).map_or(false, |v| numeric_cmp(leaf.op, v, pat))
    } else {
        nums.as_slice().iter().any(|&v| numeric_cmp(leaf.op, v, pat))
    }
}

fn eval_strings(leaf: &Leaf, state: &MatchState, items: &[Vec<u8>]) -> bool {
    if !matches!(leaf.pattern, Pattern::Str(_)) {
        return false;
    }
    if leaf.index >= 0 {
        items.get(leaf.index as usize).map_or(false, |s| string_matches(leaf, state, s))
    } else {
        items.iter().any(|s| string_matches(leaf, state, s))
    }
}

fn eval_atoms(leaf: &Leaf, state: &MatchState, atoms: &[crate::atom::AtomId]) -> bool {
    if !matches!(leaf.pattern, Pattern::Str(_)) {
        return false;
    }
    let name_of = |a: crate::atom::AtomId| state.catalogue.name_of(a);
    if leaf.index >= 0 {
        atoms
            .get(leaf.index as usize)
            .and_then(|&a| name_of(a))
            .map_or(false, |name| string_matches(leaf, state, name))
    } else {
        atoms.iter().any(|&a| name_of(a).map_or(false, |name| string_matches(leaf, state, name)))
    }
}

fn numeric_cmp(op: CmpOp, value: i64, pattern: i64) -> bool {
    match op {
        CmpOp::Eq => value == pattern,
        CmpOp::Gt => value > pattern,
        CmpOp::Ge => value >= pattern,
        CmpOp::Lt => value < pattern,
        CmpOp::Le => value <= pattern,
        CmpOp::Exists => false,
    }
}

fn string_matches(leaf: &Leaf, state: &MatchState, value: &[u8]) -> bool {
    let Pattern::Str(pattern) = &leaf.pattern else {
        return false;
    };
    match leaf.mode {
        MatchMode::Exact => bytes_eq(value, pattern, leaf.case_insensitive),
        MatchMode::Contains => bytes_contains(value, pattern, leaf.case_insensitive),
        MatchMode::StartsWith => bytes_starts_with(value, pattern, leaf.case_insensitive),
        MatchMode::Wildcard => wildcard_match(pattern, value, leaf.case_insensitive),
        MatchMode::Pcre => pcre_matches(leaf.leaf_id, state.index, value),
    }
}

#[cfg(feature = "pcre")]
fn pcre_matches(leaf_id: u32, index: &TrackedIndex, value: &[u8]) -> bool {
    match index.compiled_pattern(leaf_id) {
        Some(re) => re.is_match(&String::from_utf8_lossy(value)),
        None => false,
    }
}

#[cfg(not(feature = "pcre"))]
fn pcre_matches(_leaf_id: u32, _index: &TrackedIndex, _value: &[u8]) -> bool {
    false
}

fn ascii_lower(b: u8) -> u8 {
    b.to_ascii_lowercase()
}

fn bytes_eq(value: &[u8], pattern: &[u8], case_insensitive: bool) -> bool {
    if !case_insensitive {
        return value == pattern;
    }
    value.len() == pattern.len() && value.iter().zip(pattern).all(|(&a, &b)| ascii_lower(a) == ascii_lower(b))
}

fn bytes_starts_with(value: &[u8], pattern: &[u8], case_insensitive: bool) -> bool {
    if value.len() < pattern.len() {
        return false;
    }
    bytes_eq(&value[..pattern.len()], pattern, case_insensitive)
}

fn bytes_contains(value: &[u8], pattern: &[u8], case_insensitive: bool) -> bool {
    if pattern.is_empty() {
        return true;
    }
    if value.len() < pattern.len() {
        return false;
    }
    (0..=value.len() - pattern.len()).any(|i| bytes_eq(&value[i..i + pattern.len()], pattern, case_insensitive))
}

/// Hand-rolled glob matcher supporting `*` and `?` (fnmatch's two most
/// load-bearing wildcards). No `fnmatch`/`glob`-style crate appears
/// anywhere in the retrieved corpus, so — following the same call made
/// for `NumCells`'s inline storage in `value.rs` — this is implemented
/// directly rather than importing a dependency nothing else here needs.
fn wildcard_match(pattern: &[u8], text: &[u8], case_insensitive: bool) -> bool {
    fn eq(a: u8, b: u8, ci: bool) -> bool {
        if ci {
            a.to_ascii_lowercase() == b.to_ascii_lowercase()
        } else {
            a == b
        }
    }

    // Two-pointer glob match with backtracking on the most recent `*`.
    let (mut pi, mut ti) = (0usize, 0usize);
    let (mut star_p, mut star_t) = (None, 0usize);

    while ti < text.len() {
        if pi < pattern.len() && (pattern[pi] == b'?' || eq(pattern[pi], text[ti], case_insensitive)) {
            pi += 1;
            ti += 1;
        } else if pi < pattern.len() && pattern[pi] == b'*' {
            star_p = Some(pi);
            star_t = ti;
            pi += 1;
        } else if let Some(sp) = star_p {
            pi = sp + 1;
            star_t += 1;
            ti = star_t;
        } else {
            return false;
        }
    }
    while pi < pattern.len() && pattern[pi] == b'*' {
        pi += 1;
    }
    pi == pattern.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{CmpOp as C, Leaf, MatchMode as M, Pattern as P, Target as T};
    use crate::atom::AtomId;
    use crate::parser::parse;
    use crate::tracked::postprocess;
    use crate::xconn::mock::MockXConn;
    use crate::xconn::PropertyReply;

    fn window(name: &str, class_g: &str) -> WindowAttrs {
        WindowAttrs { name: name.into(), class_g: class_g.into(), ..Default::default() }
    }

    #[test]
    fn scenario_1_simple_name_equality() {
        let expr = parse(r#"name = "xterm""#).unwrap();
        let index = TrackedIndex::new();
        let catalogue = Catalogue::new();
        let state = MatchState { catalogue: &catalogue, index: &index };
        let props = WindowProperties::new();

        assert!(eval(&expr, &state, &window("xterm", ""), &props));
        assert!(!eval(&expr, &state, &window("asdf", ""), &props));
    }

    #[test]
    fn scenario_2_conjunction_of_predefined_attrs() {
        let expr = parse(r#"name = "xterm" && class_g *= "XTerm""#).unwrap();
        let index = TrackedIndex::new();
        let catalogue = Catalogue::new();
        let state = MatchState { catalogue: &catalogue, index: &index };
        let props = WindowProperties::new();

        assert!(eval(&expr, &state, &window("xterm", "XTerm"), &props));
        assert!(!eval(&expr, &state, &window("xterm", "asdf"), &props));
    }

    #[test]
    fn scenario_4_wildcard_index_any_element_atom_state() {
        let xconn = MockXConn::new();
        let mut catalogue = Catalogue::new();
        let mut index = TrackedIndex::new();
        let mut expr = parse("_NET_WM_STATE[*]:32a *='_NET_WM_STATE_HIDDEN'").unwrap();
        postprocess(&mut expr, &mut catalogue, &xconn, &mut index);

        let state_atom = index.entries()[0].key.atom;
        let hidden = catalogue.lookup(b"_NET_WM_STATE_HIDDEN").unwrap_or(AtomId(777));
        catalogue.insert(b"_NET_WM_STATE_HIDDEN", hidden);
        let fullscreen = AtomId(9001);

        let mut props = WindowProperties::new();
        props.sync_capacity(&index);
        crate::fetch::fetch_all(&index, &mut props, &mut catalogue, &xconn, 1, 1);
        // No property registered at all: cell stays invalid, leaf is false.
        let state = MatchState { catalogue: &catalogue, index: &index };
        assert!(!eval(&expr, &state, &WindowAttrs::default(), &props));

        xconn.set_property(
            1,
            state_atom,
            PropertyReply {
                format: 32,
                type_: crate::atom::XA_ATOM,
                bytes_after: 0,
                data: [fullscreen.0.to_ne_bytes(), hidden.0.to_ne_bytes()].concat(),
            },
        );
        let mut props2 = WindowProperties::new();
        props2.sync_capacity(&index);
        crate::fetch::fetch_all(&index, &mut props2, &mut catalogue, &xconn, 1, 1);
        let state2 = MatchState { catalogue: &catalogue, index: &index };
        assert!(eval(&expr, &state2, &WindowAttrs::default(), &props2));
    }

    #[test]
    fn deprecated_predefined_always_false() {
        let leaf = Leaf::new(T::Predefined(Predefined::Id), false, 0, C::Exists, M::Exact, false, P::Undetermined);
        let expr = Expr::leaf(leaf);
        let index = TrackedIndex::new();
        let catalogue = Catalogue::new();
        let state = MatchState { catalogue: &catalogue, index: &index };
        let props = WindowProperties::new();
        assert!(!eval(&expr, &state, &WindowAttrs::default(), &props));
    }

    #[test]
    fn unresolved_atom_leaf_is_false() {
        let mut leaf = Leaf::new(T::Atom(b"_SOME_ATOM".to_vec()), false, 0, C::Eq, M::Exact, false, P::Int(1));
        leaf.target_id = crate::atom::NONE;
        let expr = Expr::leaf(leaf);
        let index = TrackedIndex::new();
        let catalogue = Catalogue::new();
        let state = MatchState { catalogue: &catalogue, index: &index };
        let props = WindowProperties::new();
        assert!(!eval(&expr, &state, &WindowAttrs::default(), &props));
    }

    #[test]
    fn xor_evaluates_both_sides_strictly() {
        let lhs = Expr::leaf(Leaf::new(T::Predefined(Predefined::Focused), false, 0, C::Eq, M::Exact, false, P::Int(1)));
        let rhs = Expr::leaf(Leaf::new(T::Predefined(Predefined::Fullscreen), false, 0, C::Eq, M::Exact, false, P::Int(1)));
        let expr = Expr::branch(BranchOp::Xor, lhs, rhs);
        let index = TrackedIndex::new();
        let catalogue = Catalogue::new();
        let state = MatchState { catalogue: &catalogue, index: &index };
        let props = WindowProperties::new();

        let mut attrs = WindowAttrs::default();
        attrs.focused = true;
        attrs.fullscreen = false;
        assert!(eval(&expr, &state, &attrs, &props));

        attrs.fullscreen = true;
        assert!(!eval(&expr, &state, &attrs, &props));
    }

    #[test]
    fn wildcard_mode_matches_glob() {
        let leaf = Leaf::new(T::Predefined(Predefined::Name), false, 0, C::Eq, M::Wildcard, false, P::Str(b"xterm*".to_vec()));
        let expr = Expr::leaf(leaf);
        let index = TrackedIndex::new();
        let catalogue = Catalogue::new();
        let state = MatchState { catalogue: &catalogue, index: &index };
        let props = WindowProperties::new();
        assert!(eval(&expr, &state, &window("xterm-256color", ""), &props));
        assert!(!eval(&expr, &state, &window("urxvt", ""), &props));
    }

    #[test]
    fn case_insensitive_exact_match() {
        let leaf = Leaf::new(T::Predefined(Predefined::Name), false, 0, C::Eq, M::Exact, true, P::Str(b"XTerm".to_vec()));
        let expr = Expr::leaf(leaf);
        let index = TrackedIndex::new();
        let catalogue = Catalogue::new();
        let state = MatchState { catalogue: &catalogue, index: &index };
        let props = WindowProperties::new();
        assert!(eval(&expr, &state, &window("xterm", ""), &props));
    }
}
