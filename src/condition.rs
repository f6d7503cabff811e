//! Owned condition sequence (spec §3 "Condition", §9 design note).
//!
//! The source keeps conditions in an intrusive doubly-linked list
//! carrying a caller-supplied user-data payload; here that's a plain
//! `Vec<Condition<T>>` with a generic `T` payload, per the design
//! note's own suggestion ("prefer an owned sequence plus a generic
//! payload parameter").

use crate::ast::Expr;
use crate::atom::Catalogue;
use crate::error::ParseError;
use crate::fetch::WindowProperties;
use crate::matcher::{self, MatchState};
use crate::parser;
use crate::tracked::{self, TrackedIndex};
use crate::window::WindowAttrs;
use crate::xconn::XConn;

/// A parsed rule plus whatever opaque data the caller wants delivered
/// when it matches (spec §3: "a tree root plus an opaque user-data payload").
pub struct Condition<T> {
    pub expr: Expr,
    pub payload: T,
}

/// An ordered list of conditions — rule priority order, first match
/// wins (spec §3, §5 "Ordering guarantees") — sharing one
/// [`TrackedIndex`] built up across every condition pushed into it.
#[derive(Default)]
pub struct ConditionList<T> {
    conditions: Vec<Condition<T>>,
    index: TrackedIndex,
}

impl<T> ConditionList<T> {
    pub fn new() -> Self {
        ConditionList { conditions: Vec::new(), index: TrackedIndex::new() }
    }

    /// Parse `rule`, postprocess it against `catalogue`/`xconn`, and
    /// append it with `payload`. A parse failure is fatal for this rule
    /// only (spec §7); the list is left exactly as it was.
    pub fn parse_and_push<X: XConn>(
        &mut self,
        rule: &str,
        payload: T,
        catalogue: &mut Catalogue,
        xconn: &X,
    ) -> Result<(), ParseError> {
        let mut expr = parser::parse(rule)?;
        tracked::postprocess(&mut expr, catalogue, xconn, &mut self.index);
        self.conditions.push(Condition { expr, payload });
        Ok(())
    }

    /// Spec §6's "Callback from caller to parser (for rule prefixes)":
    /// `prefix` consumes a caller-defined header off the front of
    /// `input` and produces both the payload and the remaining text to
    /// parse as an ordinary condition. Rust's ownership makes the
    /// source's `free_value(opaque)` callback unnecessary — a `prefix`
    /// that returns `None` simply drops whatever it built.
    pub fn parse_prefixed<X: XConn>(
        &mut self,
        input: &str,
        catalogue: &mut Catalogue,
        xconn: &X,
        prefix: impl FnOnce(&str) -> Option<(T, &str)>,
    ) -> Result<(), ParseError> {
        match prefix(input) {
            Some((payload, rest)) => self.parse_and_push(rest, payload, catalogue, xconn),
            None => Err(ParseError::new(input, 0, "rule prefix callback did not recognize this rule")),
        }
    }

    /// Allocate cells for every tracked property against a window pair
    /// and run the two-phase fetch (spec §4.E).
    pub fn fetch<X: XConn>(&self, props: &mut WindowProperties, catalogue: &mut Catalogue, xconn: &X, client_win: u32, frame_win: u32) {
        crate::fetch::fetch_all(&self.index, props, catalogue, xconn, client_win, frame_win);
    }

    /// Visit conditions in list order, returning the payload of the
    /// first one whose tree matches (spec §5 "first match wins").
    pub fn find_match(&self, catalogue: &Catalogue, attrs: &WindowAttrs, props: &WindowProperties) -> Option<&T> {
        let state = MatchState { catalogue, index: &self.index };
        self.conditions.iter().find(|c| matcher::eval(&c.expr, &state, attrs, props)).map(|c| &c.payload)
    }

    pub fn index(&self) -> &TrackedIndex {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xconn::mock::MockXConn;

    #[test]
    fn first_match_wins() {
        let xconn = MockXConn::new();
        let mut catalogue = Catalogue::new();
        let mut list: ConditionList<&'static str> = ConditionList::new();
        list.parse_and_push(r#"name = "xterm""#, "rule-a", &mut catalogue, &xconn).unwrap();
        list.parse_and_push(r#"name *= "term""#, "rule-b", &mut catalogue, &xconn).unwrap();

        let attrs = WindowAttrs { name: "xterm".into(), ..Default::default() };
        let props = WindowProperties::new();
        assert_eq!(list.find_match(&catalogue, &attrs, &props), Some(&"rule-a"));
    }

    #[test]
    fn later_rule_matches_when_earlier_does_not() {
        let xconn = MockXConn::new();
        let mut catalogue = Catalogue::new();
        let mut list: ConditionList<&'static str> = ConditionList::new();
        list.parse_and_push(r#"name = "xterm""#, "rule-a", &mut catalogue, &xconn).unwrap();
        list.parse_and_push(r#"name *= "term""#, "rule-b", &mut catalogue, &xconn).unwrap();

        let attrs = WindowAttrs { name: "urxvt-term".into(), ..Default::default() };
        let props = WindowProperties::new();
        assert_eq!(list.find_match(&catalogue, &attrs, &props), Some(&"rule-b"));
    }

    #[test]
    fn no_match_returns_none() {
        let xconn = MockXConn::new();
        let mut catalogue = Catalogue::new();
        let mut list: ConditionList<&'static str> = ConditionList::new();
        list.parse_and_push(r#"name = "xterm""#, "rule-a", &mut catalogue, &xconn).unwrap();

        let attrs = WindowAttrs { name: "firefox".into(), ..Default::default() };
        let props = WindowProperties::new();
        assert_eq!(list.find_match(&catalogue, &attrs, &props), None);
    }

    #[test]
    fn parse_failure_leaves_list_untouched() {
        let xconn = MockXConn::new();
        let mut catalogue = Catalogue::new();
        let mut list: ConditionList<()> = ConditionList::new();
        list.parse_and_push(r#"name = "xterm""#, (), &mut catalogue, &xconn).unwrap();
        assert!(list.parse_and_push("!!!!!!!((((((!(((((", (), &mut catalogue, &xconn).is_err());
        assert_eq!(list.len(), 1);
    }
}
