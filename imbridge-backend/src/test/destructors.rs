use super::*;

#[test]
fn destructor_request_runs_destroyed_then_deletes() {
    let (mut backend, global) = backend_with_thing();
    let mut state = TestState::default();
    let (mut client, _) = TestClient::connect(&mut backend);

    let registry = client.get_registry();
    let thing = client.bind(registry, global.name(), &TEST_THING_INTERFACE, 2);
    client.send(message!(thing, 3, []));
    backend.dispatch_all_clients(&mut state);

    assert_eq!(state.destroyed, vec![thing]);
    assert_eq!(deleted_ids(&client.events()), vec![thing]);

    let again = client.bind(registry, global.name(), &TEST_THING_INTERFACE, 2);
    client.send(message!(again, 0, [Argument::Uint(5)]));
    backend.dispatch_all_clients(&mut state);
    assert_eq!(state.pokes, vec![(again, 5)]);
}

#[test]
fn disconnect_destroys_every_object() {
    let (mut backend, global) = backend_with_thing();
    let mut state = TestState::default();
    let (mut client, client_id) = TestClient::connect(&mut backend);

    let registry = client.get_registry();
    let thing = client.bind(registry, global.name(), &TEST_THING_INTERFACE, 2);
    let child = client.new_id(&TEST_THING_INTERFACE);
    client.send(message!(thing, 2, [Argument::NewId(child)]));
    backend.dispatch_all_clients(&mut state);
    assert!(state.destroyed.is_empty());

    drop(client);
    assert!(backend.dispatch_client(&mut state, client_id.clone()).is_err());

    state.destroyed.sort();
    assert_eq!(state.destroyed, vec![thing, child]);
    assert!(backend.handle().get_client_data(client_id).is_err());
    assert_eq!(backend.handle().all_clients().count(), 0);
}

#[test]
fn other_clients_survive_a_disconnect() {
    let (mut backend, global) = backend_with_thing();
    let mut state = TestState::default();
    let (mut first, _) = TestClient::connect(&mut backend);
    let (mut second, _) = TestClient::connect(&mut backend);

    let registry = first.get_registry();
    first.bind(registry, global.name(), &TEST_THING_INTERFACE, 2);
    let registry = second.get_registry();
    let thing = second.bind(registry, global.name(), &TEST_THING_INTERFACE, 2);
    backend.dispatch_all_clients(&mut state);

    drop(first);
    second.send(message!(thing, 0, [Argument::Uint(1)]));
    backend.dispatch_all_clients(&mut state);

    assert_eq!(state.destroyed.len(), 1);
    assert_eq!(state.pokes, vec![(thing, 1)]);
    assert_eq!(backend.handle().all_clients().count(), 1);
}
