mod helpers;

use helpers::{enabled_v3, find, int, names, object, text, uint, TestClient, TestServer};

/// A v1 input method serving a v1 text input
struct LegacyPair {
    ime: TestClient,
    im: u32,
    context: u32,
    app: TestClient,
    text_input: u32,
}

fn legacy_pair(server: &mut TestServer) -> LegacyPair {
    let mut ime = server.add_client();
    let im = ime.input_method_v1();
    server.roundtrip(&mut ime);

    let mut app = server.add_client();
    let surface = app.surface();
    let seat = app.seat();
    let text_input = app.text_input_v1();
    server.roundtrip(&mut app);
    server.focus(&app, Some(surface));
    // not activated yet, v1 does not enter
    assert!(app.events().is_empty());

    app.request(text_input, "activate", vec![object(seat), object(surface)]);
    assert_eq!(names(&server.roundtrip(&mut app), text_input), ["enter"]);
    let events = ime.events();
    let context = find(&events, im, "activate")[0].object(0);
    assert_eq!(
        names(&events, context),
        ["surrounding_text", "content_type", "preferred_language", "commit_state"]
    );
    LegacyPair { ime, im, context, app, text_input }
}

#[test]
fn input_method_v2_reply_reaches_v3() {
    let mut server = TestServer::new();
    let mut ime = server.add_client();
    let im = ime.input_method_v2();
    let (mut app, _, text_input) = enabled_v3(&mut server);
    let _ = ime.events();

    ime.request(im, "delete_surrounding_text", vec![uint(1), uint(0)]);
    ime.request(im, "commit_string", vec![text("x")]);
    ime.request(im, "set_preedit_string", vec![text("yz"), int(2), int(2)]);
    ime.request(im, "commit", vec![uint(1)]);
    server.dispatch();
    let events = app.events();
    assert_eq!(
        names(&events, text_input),
        ["delete_surrounding_text", "commit_string", "preedit_string", "done"]
    );
    let delete = &find(&events, text_input, "delete_surrounding_text")[0];
    assert_eq!((delete.uint(0), delete.uint(1)), (1, 0));
    assert_eq!(find(&events, text_input, "commit_string")[0].string(0).as_deref(), Some("x"));
    let preedit = &find(&events, text_input, "preedit_string")[0];
    assert_eq!(preedit.string(0).as_deref(), Some("yz"));
    assert_eq!((preedit.int(1), preedit.int(2)), (2, 2));
    // the enable commit got done 1
    assert_eq!(find(&events, text_input, "done")[0].uint(0), 2);

    // the client commits again: the pre-edit stays, nothing reaches the input method
    app.request(text_input, "set_cursor_rectangle", vec![int(1), int(2), int(3), int(4)]);
    app.request(text_input, "commit", vec![]);
    let events = server.roundtrip(&mut app);
    assert_eq!(names(&events, text_input), ["preedit_string", "done"]);
    assert_eq!(find(&events, text_input, "done")[0].uint(0), 3);
    assert!(ime.events().is_empty());
}

#[test]
fn stale_input_method_commit_is_discarded() {
    let mut server = TestServer::new();
    let mut ime = server.add_client();
    let im = ime.input_method_v2();
    let (mut app, _, text_input) = enabled_v3(&mut server);
    let _ = ime.events();

    // one done was sent, serial 0 answers an older state
    ime.request(im, "commit_string", vec![text("late")]);
    ime.request(im, "commit", vec![uint(0)]);
    server.dispatch();
    assert!(app.events().is_empty());

    // the discarded parts do not come back with the next commit
    ime.request(im, "commit", vec![uint(1)]);
    server.dispatch();
    let events = app.events();
    assert_eq!(names(&events, text_input), ["done"]);
}

#[test]
fn state_change_is_sent_once() {
    let mut server = TestServer::new();
    let mut ime = server.add_client();
    let im = ime.input_method_v2();
    let (mut app, _, text_input) = enabled_v3(&mut server);
    let _ = ime.events();

    app.request(text_input, "set_surrounding_text", vec![text("hello"), int(5), int(5)]);
    app.request(text_input, "commit", vec![]);
    server.roundtrip(&mut app);
    let events = ime.events();
    assert_eq!(names(&events, im), ["surrounding_text", "text_change_cause", "done"]);
    assert_eq!(server.core.input_method().unwrap().serial(), 2);

    // the same state again
    app.request(text_input, "set_surrounding_text", vec![text("hello"), int(5), int(5)]);
    app.request(text_input, "commit", vec![]);
    server.roundtrip(&mut app);
    assert!(ime.events().is_empty());
}

#[test]
fn input_method_v1_reply_reaches_v2() {
    let mut server = TestServer::new();
    let mut ime = server.add_client();
    let im = ime.input_method_v1();
    server.roundtrip(&mut ime);

    let mut app = server.add_client();
    let surface = app.surface();
    let text_input = app.text_input_v2();
    server.roundtrip(&mut app);
    server.focus(&app, Some(surface));
    let events = app.events();
    assert_eq!(names(&events, text_input), ["enter"]);
    assert_eq!(events[0].uint(0), 1);

    app.request(text_input, "enable", vec![object(surface)]);
    server.roundtrip(&mut app);
    let events = ime.events();
    let context = find(&events, im, "activate")[0].object(0);
    assert_eq!(find(&events, context, "commit_state")[0].uint(0), 0);

    ime.request(context, "delete_surrounding_text", vec![int(-1), uint(1)]);
    ime.request(context, "commit_string", vec![uint(0), text("c")]);
    ime.request(context, "preedit_cursor", vec![int(1)]);
    ime.request(context, "preedit_styling", vec![uint(0), uint(2), uint(4)]);
    ime.request(context, "preedit_string", vec![uint(0), text("ab"), text("a")]);
    server.dispatch();
    let events = app.events();
    assert_eq!(
        names(&events, text_input),
        [
            "delete_surrounding_text",
            "commit_string",
            "preedit_styling",
            "preedit_cursor",
            "preedit_string"
        ]
    );
    let delete = &find(&events, text_input, "delete_surrounding_text")[0];
    assert_eq!((delete.uint(0), delete.uint(1)), (1, 0));
    let styling = &find(&events, text_input, "preedit_styling")[0];
    assert_eq!((styling.uint(0), styling.uint(1), styling.uint(2)), (0, 2, 4));
    assert_eq!(find(&events, text_input, "preedit_cursor")[0].int(0), 1);
    let preedit = &find(&events, text_input, "preedit_string")[0];
    assert_eq!(preedit.string(0).as_deref(), Some("ab"));
    assert_eq!(preedit.string(1).as_deref(), Some("a"));
}

#[test]
fn input_method_v1_events_carry_the_commit_serial() {
    let mut server = TestServer::new();
    let LegacyPair { mut ime, context, mut app, text_input, .. } = legacy_pair(&mut server);

    // nothing changed, nothing is forwarded
    app.request(text_input, "commit_state", vec![uint(7)]);
    server.roundtrip(&mut app);
    assert!(ime.events().is_empty());

    ime.request(context, "commit_string", vec![uint(0), text("hi")]);
    ime.request(context, "keysym", vec![uint(0), uint(100), uint(0xff0d), uint(1), uint(0)]);
    ime.request(context, "language", vec![uint(0), text("fr")]);
    ime.request(context, "cursor_position", vec![int(1), int(1)]);
    ime.request(context, "text_direction", vec![uint(0), uint(2)]);
    server.dispatch();
    let events = app.events();
    assert_eq!(
        names(&events, text_input),
        ["commit_string", "keysym", "language", "cursor_position", "text_direction"]
    );
    let commit = &find(&events, text_input, "commit_string")[0];
    assert_eq!(commit.uint(0), 7);
    assert_eq!(commit.string(1).as_deref(), Some("hi"));
    let keysym = &find(&events, text_input, "keysym")[0];
    assert_eq!(
        (keysym.uint(0), keysym.uint(1), keysym.uint(2), keysym.uint(3), keysym.uint(4)),
        (7, 100, 0xff0d, 1, 0)
    );
    let language = &find(&events, text_input, "language")[0];
    assert_eq!((language.uint(0), language.string(1).as_deref()), (7, Some("fr")));
    let direction = &find(&events, text_input, "text_direction")[0];
    assert_eq!((direction.uint(0), direction.uint(1)), (7, 2));
}

#[test]
fn legacy_reset_and_actions_reach_the_context() {
    let mut server = TestServer::new();
    let LegacyPair { mut ime, context, mut app, text_input, .. } = legacy_pair(&mut server);

    app.request(text_input, "set_surrounding_text", vec![text("abc"), uint(1), uint(1)]);
    app.request(text_input, "reset", vec![]);
    app.request(text_input, "invoke_action", vec![uint(1), uint(2)]);
    server.roundtrip(&mut app);
    let events = ime.events();
    assert_eq!(
        names(&events, context),
        [
            "reset",
            "surrounding_text",
            "content_type",
            "preferred_language",
            "commit_state",
            "invoke_action"
        ]
    );
    let surrounding = &find(&events, context, "surrounding_text")[0];
    assert_eq!(surrounding.string(0).as_deref(), Some("abc"));
    assert_eq!(find(&events, context, "commit_state")[0].uint(0), 1);
    let action = &find(&events, context, "invoke_action")[0];
    assert_eq!((action.uint(0), action.uint(1)), (1, 2));
}

#[test]
fn stale_context_is_ignored() {
    let mut server = TestServer::new();
    let LegacyPair { mut ime, im, context, mut app, text_input } = legacy_pair(&mut server);

    // moving the focus away and back needs a new activation
    let other = app.surface();
    server.roundtrip(&mut app);
    server.focus(&app, Some(other));
    let events = ime.events();
    assert_eq!(names(&events, im), ["deactivate"]);
    assert_eq!(events[0].object(0), context);

    ime.request(context, "commit_string", vec![uint(0), text("lost")]);
    server.dispatch();
    assert!(find(&app.events(), text_input, "commit_string").is_empty());
}

#[test]
fn empty_preedit_clears_composing() {
    let mut server = TestServer::new();
    let mut ime = server.add_client();
    let im = ime.input_method_v2();
    let (mut app, _, text_input) = enabled_v3(&mut server);
    let _ = ime.events();

    ime.request(im, "set_preedit_string", vec![text("ab"), int(1), int(1)]);
    ime.request(im, "commit", vec![uint(1)]);
    server.dispatch();
    assert_eq!(names(&app.events(), text_input), ["preedit_string", "done"]);

    ime.request(im, "set_preedit_string", vec![text(""), int(0), int(0)]);
    ime.request(im, "commit", vec![uint(1)]);
    server.dispatch();
    let events = app.events();
    assert_eq!(names(&events, text_input), ["preedit_string", "done"]);
    let preedit = &find(&events, text_input, "preedit_string")[0];
    assert_eq!(preedit.string(0).as_deref(), Some(""));
    assert_eq!((preedit.int(1), preedit.int(2)), (0, 0));

    // nothing left to show again with the next acknowledgement
    app.request(text_input, "set_cursor_rectangle", vec![int(1), int(2), int(3), int(4)]);
    app.request(text_input, "commit", vec![]);
    let events = server.roundtrip(&mut app);
    assert_eq!(names(&events, text_input), ["done"]);
}

#[test]
fn long_deletion_for_a_legacy_text_input() {
    let mut server = TestServer::new();
    let mut ime = server.add_client();
    let im = ime.input_method_v2();
    server.roundtrip(&mut ime);

    let mut app = server.add_client();
    let surface = app.surface();
    let seat = app.seat();
    let text_input = app.text_input_v1();
    server.roundtrip(&mut app);
    server.focus(&app, Some(surface));
    app.request(text_input, "activate", vec![object(seat), object(surface)]);
    server.roundtrip(&mut app);
    assert_eq!(find(&ime.events(), im, "activate").len(), 1);
    let serial = server.core.input_method().unwrap().serial();

    // more than the signed index of v1 can hold
    ime.request(im, "delete_surrounding_text", vec![uint(0x8000_0000), uint(0)]);
    ime.request(im, "commit_string", vec![text("x")]);
    ime.request(im, "commit", vec![uint(serial)]);
    server.dispatch();
    let events = app.events();
    assert_eq!(names(&events, text_input), ["delete_surrounding_text", "commit_string"]);
    let delete = &find(&events, text_input, "delete_surrounding_text")[0];
    assert_eq!(delete.int(0), -i32::MAX);
    assert_eq!(delete.uint(1), i32::MAX as u32);
}
