//! Per-connection table of protocol objects

use crate::protocol::Interface;

use std::cmp::Ordering;

/// Ids at or above this value are allocated by the server
pub const SERVER_ID_LIMIT: u32 = 0xFF00_0000;

/// A protocol object as stored in the table
#[derive(Debug, Clone)]
pub struct Object<Data> {
    /// Interface of the object
    pub interface: &'static Interface,
    /// Version negotiated when the object was created
    pub version: u32,
    /// Backend bookkeeping attached to the object
    pub data: Data,
}

/// Id to object table of one client connection
///
/// Client-allocated ids start at 1 and must be allocated densely, server-allocated
/// ids start at [`SERVER_ID_LIMIT`].
#[derive(Debug, Default)]
pub struct ObjectMap<Data> {
    client_objects: Vec<Option<Object<Data>>>,
    server_objects: Vec<Option<Object<Data>>>,
}

impl<Data: Clone> ObjectMap<Data> {
    /// An empty table
    pub fn new() -> Self {
        Self { client_objects: Vec::new(), server_objects: Vec::new() }
    }

    fn slot(&self, id: u32) -> Option<&Option<Object<Data>>> {
        match id {
            0 => None,
            id if id >= SERVER_ID_LIMIT => self.server_objects.get((id - SERVER_ID_LIMIT) as usize),
            id => self.client_objects.get((id - 1) as usize),
        }
    }

    fn slot_mut(&mut self, id: u32) -> Option<&mut Option<Object<Data>>> {
        match id {
            0 => None,
            id if id >= SERVER_ID_LIMIT => {
                self.server_objects.get_mut((id - SERVER_ID_LIMIT) as usize)
            }
            id => self.client_objects.get_mut((id - 1) as usize),
        }
    }

    /// Look up an object
    pub fn find(&self, id: u32) -> Option<Object<Data>> {
        self.slot(id).and_then(Clone::clone)
    }

    /// Free an id, no-op if it is not in use
    pub fn remove(&mut self, id: u32) {
        if let Some(place) = self.slot_mut(id) {
            *place = None;
        }
    }

    /// Store an object under an id chosen by the peer
    ///
    /// Fails if the id is already in use or skips over unused ids, both of
    /// which are protocol errors.
    pub fn insert_at(&mut self, id: u32, object: Object<Data>) -> Result<(), ()> {
        match id {
            0 => Err(()),
            id if id >= SERVER_ID_LIMIT => {
                insert_in_at(&mut self.server_objects, (id - SERVER_ID_LIMIT) as usize, object)
            }
            id => insert_in_at(&mut self.client_objects, (id - 1) as usize, object),
        }
    }

    /// Store an object under a fresh server-side id
    pub fn server_insert_new(&mut self, object: Object<Data>) -> u32 {
        let idx = match self.server_objects.iter().position(Option::is_none) {
            Some(idx) => {
                self.server_objects[idx] = Some(object);
                idx
            }
            None => {
                self.server_objects.push(Some(object));
                self.server_objects.len() - 1
            }
        };
        idx as u32 + SERVER_ID_LIMIT
    }

    /// Run a closure on a stored object
    pub fn with<T, F: FnOnce(&mut Object<Data>) -> T>(&mut self, id: u32, f: F) -> Result<T, ()> {
        match self.slot_mut(id) {
            Some(Some(obj)) => Ok(f(obj)),
            _ => Err(()),
        }
    }

    /// Iterate over all live ids, client ids first
    pub fn all_objects(&self) -> impl Iterator<Item = (u32, &Object<Data>)> {
        let client_side = self
            .client_objects
            .iter()
            .enumerate()
            .filter_map(|(idx, obj)| obj.as_ref().map(|obj| (idx as u32 + 1, obj)));
        let server_side = self
            .server_objects
            .iter()
            .enumerate()
            .filter_map(|(idx, obj)| obj.as_ref().map(|obj| (idx as u32 + SERVER_ID_LIMIT, obj)));
        client_side.chain(server_side)
    }
}

fn insert_in_at<Data>(
    store: &mut Vec<Option<Object<Data>>>,
    idx: usize,
    object: Object<Data>,
) -> Result<(), ()> {
    match idx.cmp(&store.len()) {
        Ordering::Greater => Err(()),
        Ordering::Equal => {
            store.push(Some(object));
            Ok(())
        }
        Ordering::Less if store[idx].is_some() => Err(()),
        Ordering::Less => {
            store[idx] = Some(object);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ANONYMOUS_INTERFACE;

    fn obj(data: u32) -> Object<u32> {
        Object { interface: &ANONYMOUS_INTERFACE, version: 1, data }
    }

    #[test]
    fn client_ids_must_be_dense() {
        let mut map = ObjectMap::new();
        assert!(map.insert_at(1, obj(1)).is_ok());
        assert!(map.insert_at(3, obj(3)).is_err());
        assert!(map.insert_at(1, obj(2)).is_err());
        assert!(map.insert_at(2, obj(2)).is_ok());
        map.remove(1);
        assert!(map.find(1).is_none());
        assert!(map.insert_at(1, obj(4)).is_ok());
        assert_eq!(map.find(1).map(|o| o.data), Some(4));
    }

    #[test]
    fn server_ids_are_reused() {
        let mut map = ObjectMap::new();
        let a = map.server_insert_new(obj(1));
        let b = map.server_insert_new(obj(2));
        assert_eq!(a, SERVER_ID_LIMIT);
        assert_eq!(b, SERVER_ID_LIMIT + 1);
        map.remove(a);
        assert_eq!(map.server_insert_new(obj(3)), a);
        assert_eq!(map.all_objects().count(), 2);
        assert_eq!(map.with(b, |o| o.data), Ok(2));
        assert!(map.with(0, |o| o.data).is_err());
    }
}
