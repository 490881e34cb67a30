mod helpers;

use helpers::{enabled_v3, find, names, text, uint, TestServer};

use imbridge::{BridgeState, InputMethodVersion, KeyEvent, KeyRouting, KeyState};

fn press(key: u32) -> KeyEvent {
    KeyEvent { serial: 1, time: 0, key, state: KeyState::Pressed }
}

#[test]
fn input_method_leaving_mid_session() {
    let mut server = TestServer::new();
    let mut ime = server.add_client();
    let im = ime.input_method_v2();
    let (mut app, _, text_input) = enabled_v3(&mut server);
    ime.create(im, "grab_keyboard", vec![]);
    server.roundtrip(&mut ime);
    assert_eq!(server.core.route_key(server.backend.handle(), press(30)), KeyRouting::Grabbed);

    ime.request(im, "destroy", vec![]);
    server.roundtrip(&mut ime);
    assert!(server.core.input_method().is_none());
    assert_eq!(server.core.bridge_state(), BridgeState::FocusedEnabled);
    assert_eq!(server.core.route_key(server.backend.handle(), press(30)), KeyRouting::Passthrough);
    // the text input stays enabled, waiting for the next input method
    assert!(app.events().is_empty());
    assert_eq!(server.core.active_text_input().unwrap().resource().protocol_id(), text_input);

    let mut next = server.add_client();
    let next_im = next.input_method_v2();
    let events = server.roundtrip(&mut next);
    assert_eq!(
        names(&events, next_im),
        ["activate", "surrounding_text", "text_change_cause", "content_type", "done"]
    );
    assert_eq!(server.core.bridge_state(), BridgeState::FocusedEnabledWithIm);
}

#[test]
fn second_input_method_is_unavailable() {
    let mut server = TestServer::new();
    let mut first = server.add_client();
    let bound = first.input_method_v2();
    let (mut app, _, _) = enabled_v3(&mut server);
    let _ = first.events();

    let mut second = server.add_client();
    let refused = second.input_method_v2();
    let events = server.roundtrip(&mut second);
    assert_eq!(names(&events, refused), ["unavailable"]);
    assert_eq!(server.core.input_method().unwrap().resource().protocol_id(), bound);

    // requests of the refused object go nowhere
    second.request(refused, "commit_string", vec![text("nope")]);
    second.request(refused, "commit", vec![uint(0)]);
    second.create(refused, "grab_keyboard", vec![]);
    server.roundtrip(&mut second);
    assert!(app.events().is_empty());
    assert!(!server.core.input_method().unwrap().has_keyboard_grab());

    // it stays refused after the first one leaves
    first.request(bound, "destroy", vec![]);
    server.roundtrip(&mut first);
    assert!(server.core.input_method().is_none());
    assert!(second.events().is_empty());
}

#[test]
fn inactive_input_method_replies_are_dropped() {
    let mut server = TestServer::new();
    let mut ime = server.add_client();
    let im = ime.input_method_v2();
    let (mut app, _, text_input) = enabled_v3(&mut server);
    app.request(text_input, "disable", vec![]);
    app.request(text_input, "commit", vec![]);
    server.roundtrip(&mut app);
    let events = ime.events();
    assert_eq!(find(&events, im, "done").len(), 2);
    assert!(!server.core.input_method().unwrap().is_active());

    // the serial matches, but nothing is active
    ime.request(im, "commit_string", vec![text("x")]);
    ime.request(im, "commit", vec![uint(2)]);
    server.dispatch();
    assert!(app.events().is_empty());
}

#[test]
fn destroying_the_active_text_input() {
    let mut server = TestServer::new();
    let mut ime = server.add_client();
    let im = ime.input_method_v2();
    let (mut app, _, text_input) = enabled_v3(&mut server);
    let _ = ime.events();

    app.request(text_input, "destroy", vec![]);
    server.roundtrip(&mut app);
    assert_eq!(names(&ime.events(), im), ["deactivate", "done"]);
    assert!(server.core.active_text_input().is_none());
    assert_eq!(server.core.bridge_state(), BridgeState::Idle);
}

#[test]
fn legacy_input_method_gets_a_context_per_activation() {
    let mut server = TestServer::new();
    let mut ime = server.add_client();
    let im = ime.input_method_v1();
    let (mut app, _, text_input) = enabled_v3(&mut server);
    let events = ime.events();
    let first = find(&events, im, "activate")[0].object(0);
    let bound = server.core.input_method().unwrap();
    assert_eq!(bound.version(), InputMethodVersion::V1);
    assert_eq!(bound.context().map(|context| context.protocol_id()), Some(first));

    app.request(text_input, "disable", vec![]);
    app.request(text_input, "commit", vec![]);
    server.roundtrip(&mut app);
    let events = ime.events();
    assert_eq!(names(&events, im), ["deactivate"]);
    assert_eq!(events[0].object(0), first);
    assert!(server.core.input_method().unwrap().context().is_none());

    app.request(text_input, "enable", vec![]);
    app.request(text_input, "commit", vec![]);
    server.roundtrip(&mut app);
    let events = ime.events();
    let second = find(&events, im, "activate")[0].object(0);
    assert_ne!(second, first);
    // state serials start over with the new context
    assert_eq!(find(&events, second, "commit_state")[0].uint(0), 0);

    // the old context can still be destroyed
    ime.request(first, "destroy", vec![]);
    server.roundtrip(&mut ime);
    assert!(server.core.input_method().unwrap().is_active());
}

#[test]
fn input_method_disconnects() {
    let mut server = TestServer::new();
    let mut ime = server.add_client();
    let im = ime.input_method_v2();
    let (mut app, _, _) = enabled_v3(&mut server);
    ime.create(im, "grab_keyboard", vec![]);
    server.roundtrip(&mut ime);
    assert!(server.core.has_active_im_grab());

    drop(ime);
    server.dispatch();
    assert!(server.core.input_method().is_none());
    assert!(!server.core.has_active_im_grab());
    assert_eq!(server.core.bridge_state(), BridgeState::FocusedEnabled);
    assert!(server.core.active_text_input().is_some());
    assert!(app.events().is_empty());
}
