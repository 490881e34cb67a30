use super::*;

fn globals_of(events: &[Message<u32, OwnedFd>], registry: u32) -> Vec<(u32, String, u32)> {
    events
        .iter()
        .filter(|e| e.sender_id == registry && e.opcode == 0)
        .map(|e| match &e.args[..] {
            [Argument::Uint(name), Argument::Str(Some(iface)), Argument::Uint(version)] => {
                (*name, iface.to_string_lossy().into_owned(), *version)
            }
            _ => panic!("bad wl_registry.global"),
        })
        .collect()
}

#[test]
fn registry_advertises_globals() {
    let (mut backend, global) = backend_with_thing();
    let mut state = TestState::default();
    let (mut client, _) = TestClient::connect(&mut backend);

    let registry = client.get_registry();
    backend.dispatch_all_clients(&mut state);
    assert_eq!(
        globals_of(&client.events(), registry),
        vec![(global.name(), "test_thing".to_owned(), 2)]
    );

    let second = backend.handle().create_global(&TEST_THING_INTERFACE, 1, Arc::new(Thing));
    backend.flush(None).unwrap();
    assert_eq!(
        globals_of(&client.events(), registry),
        vec![(second.name(), "test_thing".to_owned(), 1)]
    );

    backend.handle().remove_global(second.clone());
    backend.flush(None).unwrap();
    let events = client.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].opcode, 1);
    assert!(backend.handle().global_info(second).is_err());
}

#[test]
fn sync_is_answered() {
    let (mut backend, _) = backend_with_thing();
    let mut state = TestState::default();
    let (mut client, _) = TestClient::connect(&mut backend);

    let callback = client.sync();
    backend.dispatch_all_clients(&mut state);
    let events = client.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].sender_id, callback);
    assert_eq!(deleted_ids(&events), vec![callback]);
}

#[test]
fn bind_above_advertised_version_is_fatal() {
    let (mut backend, global) = backend_with_thing();
    let mut state = TestState::default();
    let (mut client, _) = TestClient::connect(&mut backend);

    let registry = client.get_registry();
    client.bind(registry, global.name(), &TEST_THING_INTERFACE, 3);
    backend.dispatch_all_clients(&mut state);

    assert_eq!(display_error(&client.events()), Some((1, 0)));
    assert!(client.is_closed());
    assert_eq!(state.binds, 0);
}

#[test]
fn unknown_global_name_is_fatal() {
    let (mut backend, _) = backend_with_thing();
    let mut state = TestState::default();
    let (mut client, _) = TestClient::connect(&mut backend);

    let registry = client.get_registry();
    client.bind(registry, 42, &TEST_THING_INTERFACE, 1);
    backend.dispatch_all_clients(&mut state);
    assert!(client.is_closed());
}
