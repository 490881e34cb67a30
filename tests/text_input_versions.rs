mod helpers;

use helpers::{enabled_v3, find, int, names, object, text, uint, TestServer};

use imbridge::{BridgeState, ContentHints, ContentPurpose, Rect, TextInputLike, TextInputVersion};

#[test]
fn v3_state_is_forwarded_on_commit() {
    let mut server = TestServer::new();
    let mut ime = server.add_client();
    let im = ime.input_method_v2();
    let (mut app, _, text_input) = enabled_v3(&mut server);
    let _ = ime.events();

    app.request(text_input, "set_surrounding_text", vec![text("hello"), int(5), int(5)]);
    // pin
    app.request(text_input, "set_content_type", vec![uint(0), uint(9)]);
    server.roundtrip(&mut app);
    // pending until the commit
    assert!(ime.events().is_empty());

    app.request(text_input, "commit", vec![]);
    let events = server.roundtrip(&mut app);
    assert_eq!(find(&events, text_input, "done")[0].uint(0), 2);
    let events = ime.events();
    assert_eq!(
        names(&events, im),
        ["surrounding_text", "text_change_cause", "content_type", "done"]
    );
    let content_type = &find(&events, im, "content_type")[0];
    assert_eq!((content_type.uint(0), content_type.uint(1)), (0, 9));

    let state = server.core.active_text_input().unwrap().current_state();
    assert_eq!(state.surrounding_text, "hello");
    assert_eq!(state.content_purpose, ContentPurpose::Pin);
}

#[test]
fn pin_becomes_password_for_input_method_v1() {
    let mut server = TestServer::new();
    let mut ime = server.add_client();
    let im = ime.input_method_v1();
    server.roundtrip(&mut ime);

    let mut app = server.add_client();
    let surface = app.surface();
    let text_input = app.text_input_v3();
    server.roundtrip(&mut app);
    server.focus(&app, Some(surface));
    app.request(text_input, "enable", vec![]);
    app.request(text_input, "set_content_type", vec![uint(0), uint(9)]);
    app.request(text_input, "commit", vec![]);
    server.roundtrip(&mut app);

    let events = ime.events();
    let context = find(&events, im, "activate")[0].object(0);
    assert_eq!(find(&events, context, "content_type")[0].uint(1), 8);
}

#[test]
fn v3_enable_resets_the_state() {
    let mut server = TestServer::new();
    let (mut app, _, text_input) = enabled_v3(&mut server);
    app.request(text_input, "set_surrounding_text", vec![text("abc"), int(1), int(1)]);
    app.request(text_input, "commit", vec![]);
    server.roundtrip(&mut app);

    app.request(text_input, "enable", vec![]);
    app.request(text_input, "commit", vec![]);
    server.roundtrip(&mut app);
    let state = server.core.active_text_input().unwrap().current_state();
    assert!(state.enabled);
    assert_eq!(state.surrounding_text, "");
}

#[test]
fn v3_disable_releases_the_input_method() {
    let mut server = TestServer::new();
    let mut ime = server.add_client();
    let im = ime.input_method_v2();
    let (mut app, _, text_input) = enabled_v3(&mut server);
    let _ = ime.events();

    app.request(text_input, "disable", vec![]);
    // not applied before the commit
    server.roundtrip(&mut app);
    assert!(ime.events().is_empty());
    app.request(text_input, "commit", vec![]);
    let events = server.roundtrip(&mut app);
    assert_eq!(names(&events, text_input), ["done"]);
    assert_eq!(names(&ime.events(), im), ["deactivate", "done"]);
    assert_eq!(server.core.bridge_state(), BridgeState::FocusedDisabled);
}

#[test]
fn v2_update_state_needs_the_last_serial() {
    let mut server = TestServer::new();
    let mut ime = server.add_client();
    let im = ime.input_method_v2();
    server.roundtrip(&mut ime);

    let mut app = server.add_client();
    let surface = app.surface();
    let text_input = app.text_input_v2();
    server.roundtrip(&mut app);
    server.focus(&app, Some(surface));
    assert_eq!(find(&app.events(), text_input, "enter")[0].uint(0), 1);

    app.request(text_input, "enable", vec![object(surface)]);
    server.roundtrip(&mut app);
    assert_eq!(server.core.bridge_state(), BridgeState::FocusedEnabledWithIm);
    let _ = ime.events();

    // applied at once, forwarded by update_state
    app.request(text_input, "set_surrounding_text", vec![text("abc"), int(3), int(3)]);
    server.roundtrip(&mut app);
    assert!(ime.events().is_empty());
    assert_eq!(server.core.active_text_input().unwrap().current_state().surrounding_text, "abc");

    app.request(text_input, "update_state", vec![uint(0), uint(0)]);
    server.roundtrip(&mut app);
    assert!(ime.events().is_empty());

    app.request(text_input, "update_state", vec![uint(1), uint(0)]);
    server.roundtrip(&mut app);
    assert_eq!(names(&ime.events(), im), ["surrounding_text", "text_change_cause", "done"]);

    // reset sends everything again
    app.request(text_input, "update_state", vec![uint(1), uint(2)]);
    server.roundtrip(&mut app);
    assert_eq!(
        names(&ime.events(), im),
        ["surrounding_text", "text_change_cause", "content_type", "done"]
    );
}

#[test]
fn v2_disable_deactivates() {
    let mut server = TestServer::new();
    let mut ime = server.add_client();
    let im = ime.input_method_v2();
    server.roundtrip(&mut ime);

    let mut app = server.add_client();
    let surface = app.surface();
    let text_input = app.text_input_v2();
    server.roundtrip(&mut app);
    server.focus(&app, Some(surface));
    app.request(text_input, "enable", vec![object(surface)]);
    server.roundtrip(&mut app);
    let _ = ime.events();

    app.request(text_input, "disable", vec![object(surface)]);
    server.roundtrip(&mut app);
    assert_eq!(names(&ime.events(), im), ["deactivate", "done"]);
    assert_eq!(server.core.bridge_state(), BridgeState::FocusedDisabled);
    // still entered
    assert!(app.events().is_empty());
}

#[test]
fn v1_only_enters_its_activated_surface() {
    let mut server = TestServer::new();
    let mut app = server.add_client();
    let first = app.surface();
    let second = app.surface();
    let seat = app.seat();
    let text_input = app.text_input_v1();
    server.roundtrip(&mut app);
    server.focus(&app, Some(second));
    assert!(app.events().is_empty());

    app.request(text_input, "activate", vec![object(seat), object(first)]);
    server.roundtrip(&mut app);
    assert!(app.events().is_empty());
    assert_eq!(server.core.bridge_state(), BridgeState::FocusedDisabled);

    server.focus(&app, Some(first));
    let events = app.events();
    assert_eq!(names(&events, text_input), ["enter"]);
    assert_eq!(events[0].object(0), first);
    // no input method bound
    assert_eq!(server.core.bridge_state(), BridgeState::FocusedEnabled);
    let active = server.core.active_text_input().unwrap();
    assert_eq!(active.version(), TextInputVersion::V1);
    assert_eq!(active.entered(), server.core.focused_surface());

    app.request(text_input, "deactivate", vec![object(seat)]);
    let events = server.roundtrip(&mut app);
    assert_eq!(names(&events, text_input), ["leave"]);
    assert_eq!(server.core.bridge_state(), BridgeState::FocusedDisabled);
}

#[test]
fn input_panel_state_reaches_legacy_text_inputs() {
    let mut server = TestServer::new();
    let mut app = server.add_client();
    let surface = app.surface();
    let text_input = app.text_input_v2();
    server.roundtrip(&mut app);
    server.focus(&app, Some(surface));
    app.request(text_input, "enable", vec![object(surface)]);
    app.request(text_input, "show_input_panel", vec![]);
    server.roundtrip(&mut app);
    assert!(server.core.input_panel_wanted());
    assert!(server.core.active_text_input().unwrap().input_panel_requested());

    let rect = Rect::new(0, 400, 800, 200);
    server.core.update_input_panel_state(server.backend.handle(), true, rect);
    server.flush();
    let events = app.events();
    let state = &find(&events, text_input, "input_panel_state")[0];
    assert_eq!(state.uint(0), 1);
    assert_eq!((state.int(1), state.int(2), state.int(3), state.int(4)), (0, 400, 800, 200));
    assert!(server.core.input_panel_state().visible);

    app.request(text_input, "hide_input_panel", vec![]);
    server.roundtrip(&mut app);
    assert!(!server.core.input_panel_wanted());
}

#[test]
fn v3_ignores_input_panel_state() {
    let mut server = TestServer::new();
    let (mut app, _, _) = enabled_v3(&mut server);
    server.core.update_input_panel_state(server.backend.handle(), true, Rect::new(0, 0, 10, 10));
    server.flush();
    assert!(app.events().is_empty());
    assert!(!server.core.input_panel_wanted());
}

#[test]
fn v3_state_reaches_a_legacy_context_unchanged() {
    let mut server = TestServer::new();
    let mut ime = server.add_client();
    let im = ime.input_method_v1();
    server.roundtrip(&mut ime);

    let mut app = server.add_client();
    let surface = app.surface();
    let text_input = app.text_input_v3();
    server.roundtrip(&mut app);
    server.focus(&app, Some(surface));
    app.request(text_input, "enable", vec![]);
    // "ö" takes bytes 8 and 9
    app.request(text_input, "set_surrounding_text", vec![text("héllo wörld"), int(3), int(10)]);
    // completion, auto capitalization, multiline; email
    app.request(text_input, "set_content_type", vec![uint(0x205), uint(6)]);
    app.request(text_input, "commit", vec![]);
    server.roundtrip(&mut app);

    let events = ime.events();
    let context = find(&events, im, "activate")[0].object(0);
    let surrounding = &find(&events, context, "surrounding_text")[0];
    assert_eq!(surrounding.string(0).as_deref(), Some("héllo wörld"));
    assert_eq!((surrounding.uint(1), surrounding.uint(2)), (3, 10));
    let content_type = &find(&events, context, "content_type")[0];
    assert_eq!((content_type.uint(0), content_type.uint(1)), (0x205, 6));

    // hidden text, sensitive data; date, one lower once Pin is skipped
    app.request(text_input, "set_content_type", vec![uint(0xc0), uint(10)]);
    app.request(text_input, "commit", vec![]);
    server.roundtrip(&mut app);
    let events = ime.events();
    assert_eq!(names(&events, context), ["content_type", "commit_state"]);
    let content_type = &find(&events, context, "content_type")[0];
    assert_eq!((content_type.uint(0), content_type.uint(1)), (0xc0, 9));
    assert_eq!(find(&events, context, "commit_state")[0].uint(0), 1);
}

#[test]
fn content_type_round_trip() {
    let mut server = TestServer::new();
    let mut ime = server.add_client();
    let im = ime.input_method_v2();
    let (mut app, _, text_input) = enabled_v3(&mut server);
    let _ = ime.events();

    let hints = ContentHints::SPELLCHECK
        | ContentHints::LOWERCASE
        | ContentHints::LATIN
        | ContentHints::MULTILINE;
    // terminal
    app.request(text_input, "set_content_type", vec![uint(hints.bits()), uint(13)]);
    app.request(text_input, "commit", vec![]);
    server.roundtrip(&mut app);

    let state = server.core.active_text_input().unwrap().current_state();
    assert_eq!(state.content_hints, hints);
    assert_eq!(state.content_purpose, ContentPurpose::Terminal);
    let events = ime.events();
    assert_eq!(names(&events, im), ["content_type", "done"]);
    let content_type = &find(&events, im, "content_type")[0];
    assert_eq!((content_type.uint(0), content_type.uint(1)), (hints.bits(), 13));
}
