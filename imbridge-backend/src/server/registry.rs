use std::{ffi::CStr, os::unix::io::RawFd, sync::Arc};

use crate::protocol::{Argument, Interface};
use crate::types::{GlobalInfo, InvalidId};

use super::{
    client::{to_cstring, Client, ClientStore},
    GlobalHandler, GlobalId, ObjectId,
};

// The name of a global is its index in `globals` plus one, 0 is never a valid name.

#[derive(Debug)]
struct Global<D: 'static> {
    id: GlobalId,
    interface: &'static Interface,
    version: u32,
    handler: Arc<dyn GlobalHandler<D>>,
    disabled: bool,
}

#[derive(Debug)]
pub(crate) struct Registry<D: 'static> {
    globals: Vec<Option<Global<D>>>,
    known_registries: Vec<ObjectId>,
    last_serial: u32,
}

impl<D> Registry<D> {
    pub(crate) fn new() -> Self {
        Self { globals: Vec::new(), known_registries: Vec::new(), last_serial: 0 }
    }

    fn next_serial(&mut self) -> u32 {
        self.last_serial = self.last_serial.wrapping_add(1);
        self.last_serial
    }

    /// Advertise a new global to every known registry.
    ///
    /// Panics if `version` is above the version of the interface description.
    pub(crate) fn create_global(
        &mut self,
        interface: &'static Interface,
        version: u32,
        handler: Arc<dyn GlobalHandler<D>>,
        clients: &mut ClientStore<D>,
    ) -> GlobalId {
        if version > interface.version {
            panic!(
                "Cannot create global {} version {}: maximum supported version is {}",
                interface.name, version, interface.version
            );
        }
        let serial = self.next_serial();
        let idx = match self.globals.iter().position(Option::is_none) {
            Some(idx) => idx,
            None => {
                self.globals.push(None);
                self.globals.len() - 1
            }
        };

        let id = GlobalId { id: idx as u32 + 1, serial };
        self.globals[idx] = Some(Global { id: id.clone(), interface, version, handler, disabled: false });

        self.send_global_to_all(&id, clients);

        id
    }

    fn get_global(&self, id: &GlobalId) -> Result<&Global<D>, InvalidId> {
        self.globals
            .get((id.id as usize).wrapping_sub(1))
            .and_then(Option::as_ref)
            .filter(|g| g.id == *id)
            .ok_or(InvalidId)
    }

    pub(crate) fn get_info(&self, id: &GlobalId) -> Result<GlobalInfo, InvalidId> {
        let global = self.get_global(id)?;
        Ok(GlobalInfo { interface: global.interface, version: global.version, disabled: global.disabled })
    }

    /// Find the global a `wl_registry.bind` designates.
    ///
    /// `None` when the name is unknown, the interface does not match, the
    /// version is 0 or above the advertised one, or the client may not see it.
    #[allow(clippy::type_complexity)]
    pub(crate) fn check_bind(
        &self,
        client: &Client<D>,
        name: u32,
        interface_name: &CStr,
        version: u32,
    ) -> Option<(&'static Interface, GlobalId, Arc<dyn GlobalHandler<D>>)> {
        if name == 0 || version == 0 {
            return None;
        }
        let target = self.globals.get((name - 1) as usize).and_then(Option::as_ref)?;
        if target.interface.name.as_bytes() != interface_name.to_bytes()
            || target.version < version
            || !target.handler.can_view(client.id.clone(), &client.data)
        {
            return None;
        }
        Some((target.interface, target.id.clone(), target.handler.clone()))
    }

    pub(crate) fn cleanup(&mut self, dead_clients: &[Client<D>]) {
        self.known_registries.retain(|obj_id| !dead_clients.iter().any(|c| c.id == obj_id.client_id))
    }

    /// Send `global_remove` for a global, it stays bindable by in-flight requests
    /// until it is removed.
    pub(crate) fn disable_global(&mut self, id: &GlobalId, clients: &mut ClientStore<D>) {
        let Some(Some(global)) = self.globals.get_mut((id.id as usize).wrapping_sub(1)) else {
            return;
        };
        if global.id != *id || global.disabled {
            return;
        }
        global.disabled = true;
        let name = global.id.id;
        for registry in self.known_registries.iter().cloned() {
            if let Ok(client) = clients.get_client_mut(registry.client_id.clone()) {
                let _ = client.send_event(
                    message!(registry, 1, [Argument::<ObjectId, RawFd>::Uint(name)]),
                    None,
                );
            }
        }
    }

    pub(crate) fn remove_global(&mut self, id: &GlobalId, clients: &mut ClientStore<D>) {
        self.disable_global(id, clients);
        if let Some(place) = self.globals.get_mut((id.id as usize).wrapping_sub(1)) {
            if place.as_ref().is_some_and(|g| g.id == *id) {
                *place = None;
            }
        }
    }

    pub(crate) fn new_registry(
        &mut self,
        registry: ObjectId,
        client: &mut Client<D>,
    ) -> Result<(), InvalidId> {
        for global in self.globals.iter().flatten() {
            if !global.disabled && global.handler.can_view(client.id.clone(), &client.data) {
                // a failing client is not worth trying further
                send_global_to(client, global, registry.clone())?;
            }
        }
        self.known_registries.push(registry);
        Ok(())
    }

    fn send_global_to_all(&self, id: &GlobalId, clients: &mut ClientStore<D>) {
        let Ok(global) = self.get_global(id) else {
            return;
        };
        for registry in self.known_registries.iter().cloned() {
            if let Ok(client) = clients.get_client_mut(registry.client_id.clone()) {
                if global.handler.can_view(client.id.clone(), &client.data) {
                    let _ = send_global_to(client, global, registry);
                }
            }
        }
    }
}

fn send_global_to<D>(
    client: &mut Client<D>,
    global: &Global<D>,
    registry: ObjectId,
) -> Result<(), InvalidId> {
    client.send_event(
        message!(
            registry,
            0, // wl_registry.global
            [
                Argument::Uint(global.id.id),
                Argument::Str(Some(Box::new(to_cstring(global.interface.name)))),
                Argument::Uint(global.version),
            ],
        ),
        None,
    )
}
