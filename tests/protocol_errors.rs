mod helpers;

use helpers::{array, display_error, enabled_v3, find, int, names, object, text, uint, TestServer};

use imbridge::BridgeState;

fn modifier_names(count: usize) -> Vec<u8> {
    (0..count).flat_map(|i| format!("Mod{i}\0").into_bytes()).collect()
}

#[test]
fn surrounding_text_inside_a_character() {
    let mut server = TestServer::new();
    let (mut app, _, text_input) = enabled_v3(&mut server);

    // "é" takes bytes 1 and 2
    app.request(text_input, "set_surrounding_text", vec![text("héllo"), int(2), int(2)]);
    let events = server.roundtrip(&mut app);
    assert_eq!(display_error(&events), Some((text_input, 0)));
    assert_eq!(server.core.text_inputs().count(), 0);
    assert_eq!(server.core.bridge_state(), BridgeState::Idle);

    // only the text input is gone
    let replacement = app.text_input_v3();
    let events = server.roundtrip(&mut app);
    assert_eq!(names(&events, replacement), ["enter"]);
    assert!(!app.is_closed());
}

#[test]
fn surrounding_text_past_the_end() {
    let mut server = TestServer::new();
    let mut app = server.add_client();
    let text_input = app.text_input_v1();
    app.request(text_input, "set_surrounding_text", vec![text("abc"), uint(4), uint(0)]);
    let events = server.roundtrip(&mut app);
    assert_eq!(display_error(&events), Some((text_input, 0)));
    assert!(!app.is_closed());
}

#[test]
fn valid_surrounding_text_on_a_boundary() {
    let mut server = TestServer::new();
    let (mut app, _, text_input) = enabled_v3(&mut server);
    app.request(text_input, "set_surrounding_text", vec![text("héllo"), int(3), int(6)]);
    app.request(text_input, "commit", vec![]);
    let events = server.roundtrip(&mut app);
    assert_eq!(display_error(&events), None);
    assert_eq!(names(&events, text_input), ["done"]);
}

#[test]
fn too_many_modifiers() {
    let mut server = TestServer::new();
    let mut ime = server.add_client();
    let im = ime.input_method_v1();
    let (_app, _, _) = enabled_v3(&mut server);
    let events = ime.events();
    let context = find(&events, im, "activate")[0].object(0);

    ime.request(context, "modifiers_map", vec![array(&modifier_names(17))]);
    let events = server.roundtrip(&mut ime);
    assert_eq!(display_error(&events), Some((im, 3)));
    assert!(server.core.input_method().is_none());
    assert_eq!(server.core.bridge_state(), BridgeState::FocusedEnabled);
    assert!(!ime.is_closed());
}

#[test]
fn modifiers_map_reaches_legacy_text_inputs() {
    let mut server = TestServer::new();
    let mut ime = server.add_client();
    let im = ime.input_method_v1();
    server.roundtrip(&mut ime);

    let mut app = server.add_client();
    let surface = app.surface();
    let text_input = app.text_input_v2();
    server.roundtrip(&mut app);
    server.focus(&app, Some(surface));
    app.request(text_input, "enable", vec![object(surface)]);
    server.roundtrip(&mut app);
    let events = ime.events();
    let context = find(&events, im, "activate")[0].object(0);

    let map = modifier_names(16);
    ime.request(context, "modifiers_map", vec![array(&map)]);
    server.dispatch();
    assert!(display_error(&ime.events()).is_none());
    let events = app.events();
    assert_eq!(find(&events, text_input, "modifiers_map")[0].array(0), &map[..]);
}

#[test]
fn second_legacy_input_method() {
    let mut server = TestServer::new();
    let mut first = server.add_client();
    let bound = first.input_method_v1();
    server.roundtrip(&mut first);

    let mut second = server.add_client();
    let refused = second.input_method_v1();
    let events = server.roundtrip(&mut second);
    assert_eq!(display_error(&events), Some((refused, 1)));
    assert!(!second.is_closed());

    let im = server.core.input_method().unwrap();
    assert_eq!(im.resource().protocol_id(), bound);
    assert!(display_error(&first.events()).is_none());
}

#[test]
fn surface_with_two_panel_roles() {
    let mut server = TestServer::new();
    let mut ime = server.add_client();
    let panel = ime.input_panel_v1();
    let surface = ime.surface();
    ime.create(panel, "get_input_panel_surface", vec![object(surface)]);
    let events = server.roundtrip(&mut ime);
    assert_eq!(display_error(&events), None);

    ime.create(panel, "get_input_panel_surface", vec![object(surface)]);
    let events = server.roundtrip(&mut ime);
    assert_eq!(display_error(&events), Some((panel, 0)));
    assert!(!ime.is_closed());
}

#[test]
fn two_popups_on_one_surface() {
    let mut server = TestServer::new();
    let mut ime = server.add_client();
    let im = ime.input_method_v2();
    let surface = ime.surface();
    ime.create(im, "get_input_popup_surface", vec![object(surface)]);
    let events = server.roundtrip(&mut ime);
    assert_eq!(display_error(&events), None);

    ime.create(im, "get_input_popup_surface", vec![object(surface)]);
    let events = server.roundtrip(&mut ime);
    assert_eq!(display_error(&events), Some((im, 0)));
    // the input method object is dead, and its popup with it
    assert!(server.core.input_method().is_none());
    assert_eq!(server.core.panels().count(), 0);
}
