//! End-to-end pipeline test: parse → postprocess → fetch → match,
//! against a `MockXConn`. Mirrors the role `toaruwm`'s `src/x/tests.rs`
//! plays for connection-level behavior, but for the condition engine's
//! own round trip (spec §8's concrete scenarios, run through the public API).

use wincond::{AtomId, Catalogue, ConditionList, Geometry, PropertyReply, WindowAttrs, WindowProperties};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[test]
fn xterm_rule_matches_through_the_whole_pipeline() {
    init_tracing();

    let xconn = wincond::xconn::mock::MockXConn::new();
    let mut catalogue = Catalogue::new();
    let mut rules: ConditionList<&'static str> = ConditionList::new();

    rules
        .parse_and_push(r#"name = "xterm" && class_g *= "XTerm""#, "terminal-rule", &mut catalogue, &xconn)
        .unwrap();
    rules
        .parse_and_push(r#"_NET_WM_STATE[*]:32a *= "_NET_WM_STATE_HIDDEN""#, "hidden-rule", &mut catalogue, &xconn)
        .unwrap();

    let matching = WindowAttrs {
        geometry: Geometry { x: 10, y: 10, width: 300, height: 200, border_width: 1 },
        name: "xterm".into(),
        class_g: "XTerm".into(),
        class_i: "xterm".into(),
        ..Default::default()
    };
    let mut props = WindowProperties::new();
    rules.fetch(&mut props, &mut catalogue, &xconn, 100, 101);

    assert_eq!(rules.find_match(&catalogue, &matching, &props), Some(&"terminal-rule"));

    let other = WindowAttrs { name: "firefox".into(), class_g: "Firefox".into(), ..Default::default() };
    assert_eq!(rules.find_match(&catalogue, &other, &props), None);
}

#[test]
fn net_wm_state_hidden_is_tracked_and_matched_via_wildcard_index() {
    init_tracing();

    let xconn = wincond::xconn::mock::MockXConn::new();
    let mut catalogue = Catalogue::new();
    let mut rules: ConditionList<&'static str> = ConditionList::new();
    rules
        .parse_and_push(r#"_NET_WM_STATE[*]:32a *= "_NET_WM_STATE_HIDDEN""#, "hidden-rule", &mut catalogue, &xconn)
        .unwrap();

    assert_eq!(rules.index().len(), 1);
    let entry = &rules.index().entries()[0];
    assert_eq!(entry.max_indices, -1);

    let state_atom = entry.key.atom;
    let hidden_atom = AtomId(9500);
    catalogue.insert(b"_NET_WM_STATE_HIDDEN", hidden_atom);

    xconn.set_property(
        1,
        state_atom,
        PropertyReply { format: 32, type_: wincond::atom::XA_ATOM, bytes_after: 0, data: hidden_atom.0.to_ne_bytes().to_vec() },
    );

    let mut props = WindowProperties::new();
    rules.fetch(&mut props, &mut catalogue, &xconn, 1, 1);

    let attrs = WindowAttrs::default();
    assert_eq!(rules.find_match(&catalogue, &attrs, &props), Some(&"hidden-rule"));
}

#[test]
fn mark_dirty_forces_a_property_to_be_refetched() {
    init_tracing();

    let xconn = wincond::xconn::mock::MockXConn::new();
    let mut catalogue = Catalogue::new();
    let mut rules: ConditionList<()> = ConditionList::new();
    rules.parse_and_push(r#"_GTK_FRAME_EXTENTS@:c"#, (), &mut catalogue, &xconn).unwrap();

    let atom = rules.index().entries()[0].key.atom;
    xconn.set_property(5, atom, PropertyReply { format: 32, type_: AtomId(6), bytes_after: 0, data: 12i32.to_ne_bytes().to_vec() });

    let mut props = WindowProperties::new();
    rules.fetch(&mut props, &mut catalogue, &xconn, 5, 5);
    assert!(props.cell(0).unwrap().valid);

    props.mark_dirty(rules.index(), atom, true);
    assert!(props.cell(0).unwrap().needs_update);

    xconn.mutate_property(5, atom, PropertyReply { format: 32, type_: AtomId(6), bytes_after: 0, data: 20i32.to_ne_bytes().to_vec() });
    rules.fetch(&mut props, &mut catalogue, &xconn, 5, 5);
    match &props.cell(0).unwrap().value {
        Some(wincond::PropertyValue::Numbers(n)) => assert_eq!(n.as_slice(), &[20]),
        other => panic!("expected Numbers(20), got {:?}", other),
    }
}

#[test]
fn utf8_string_typed_atom_property_matches_as_a_string() {
    init_tracing();

    let xconn = wincond::xconn::mock::MockXConn::new();
    // Real callers construct the catalogue this way so the string-class
    // atoms (UTF8_STRING/C_STRING) this property's type check depends on
    // are pre-interned before the first fetch.
    let mut catalogue = Catalogue::with_well_known(&xconn);
    let mut rules: ConditionList<&'static str> = ConditionList::new();
    rules
        .parse_and_push(r#"_NET_WM_NAME = "xterm""#, "utf8-name-rule", &mut catalogue, &xconn)
        .unwrap();

    let atom = rules.index().entries()[0].key.atom;
    let utf8_type = catalogue.lookup(b"UTF8_STRING").expect("UTF8_STRING pre-interned");
    xconn.set_property(1, atom, PropertyReply { format: 8, type_: utf8_type, bytes_after: 0, data: b"xterm".to_vec() });

    let mut props = WindowProperties::new();
    rules.fetch(&mut props, &mut catalogue, &xconn, 1, 1);

    let attrs = WindowAttrs::default();
    assert_eq!(rules.find_match(&catalogue, &attrs, &props), Some(&"utf8-name-rule"));
}

#[test]
fn parse_error_on_one_rule_does_not_prevent_loading_others() {
    let xconn = wincond::xconn::mock::MockXConn::new();
    let mut catalogue = Catalogue::new();
    let mut rules: ConditionList<&'static str> = ConditionList::new();

    assert!(rules.parse_and_push("argb = 'b'", "bad-rule", &mut catalogue, &xconn).is_err());
    rules.parse_and_push(r#"name = "ok""#, "good-rule", &mut catalogue, &xconn).unwrap();
    assert_eq!(rules.len(), 1);

    let attrs = WindowAttrs { name: "ok".into(), ..Default::default() };
    let props = WindowProperties::new();
    assert_eq!(rules.find_match(&catalogue, &attrs, &props), Some(&"good-rule"));
}
