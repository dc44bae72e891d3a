use std::collections::HashMap;

use crate::handle::DeviceHandle;

/// Generation-stamped reference to a session slot.
///
/// Wire handles are reused once a unit is closed; a key from before the
/// close stays distinguishable from the session that replaced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey {
    index: u32,
    generation: u32,
}

impl SessionKey {
    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

/// An open device session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub handle: DeviceHandle,
    pub identity: String,
    pub flags: u8,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    session: Option<Session>,
}

/// Slot arena of open sessions, indexed by wire handle.
#[derive(Debug, Default)]
pub struct SessionTable {
    slots: Vec<Slot>,
    free: Vec<u32>,
    by_handle: HashMap<DeviceHandle, SessionKey>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly opened session.
    ///
    /// A session already holding `handle` is displaced and returned.
    pub fn insert(&mut self, session: Session) -> (SessionKey, Option<Session>) {
        let displaced = self.remove(session.handle);
        let handle = session.handle;

        let key = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.session = Some(session);
                SessionKey {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                // one slot per live 14-bit handle at most
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    session: Some(session),
                });
                SessionKey {
                    index,
                    generation: 0,
                }
            }
        };

        self.by_handle.insert(handle, key);
        (key, displaced)
    }

    /// Release the session for `handle`.
    pub fn remove(&mut self, handle: DeviceHandle) -> Option<Session> {
        let key = self.by_handle.remove(&handle)?;
        let slot = &mut self.slots[key.index as usize];
        let session = slot.session.take();
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(key.index);
        session
    }

    /// Key of the live session for `handle`.
    pub fn lookup(&self, handle: DeviceHandle) -> Option<SessionKey> {
        self.by_handle.get(&handle).copied()
    }

    pub fn contains(&self, handle: DeviceHandle) -> bool {
        self.by_handle.contains_key(&handle)
    }

    /// The session `key` refers to, if it has not been closed since.
    pub fn get(&self, key: SessionKey) -> Option<&Session> {
        let slot = self.slots.get(key.index as usize)?;
        if slot.generation != key.generation {
            return None;
        }
        slot.session.as_ref()
    }

    pub fn is_live(&self, key: SessionKey) -> bool {
        self.get(key).is_some()
    }

    /// Release every session, in handle order.
    pub fn drain(&mut self) -> Vec<Session> {
        let mut handles: Vec<DeviceHandle> = self.by_handle.keys().copied().collect();
        handles.sort_unstable();
        handles
            .into_iter()
            .filter_map(|handle| self.remove(handle))
            .collect()
    }

    /// Open sessions in handle order.
    pub fn sessions(&self) -> Vec<&Session> {
        let mut sessions: Vec<&Session> = self
            .slots
            .iter()
            .filter_map(|slot| slot.session.as_ref())
            .collect();
        sessions.sort_unstable_by_key(|s| s.handle);
        sessions
    }

    pub fn len(&self) -> usize {
        self.by_handle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_handle.is_empty()
    }
}
