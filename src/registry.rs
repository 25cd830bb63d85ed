//! Sessions keyed by id, with the join lifecycle
//! `Idle → Connecting → Active → Idle`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::debug;

use crate::display::DisplaySink;
use crate::error::{Result, SessionError};
use crate::player::Player;
use crate::session::{DurationPolicy, Session, SessionId, SessionSettings, TeardownReason};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Active,
}

enum Slot {
    Connecting,
    Active(Arc<Session>),
}

type Slots = Mutex<HashMap<SessionId, Slot>>;

#[derive(Clone, Default)]
pub struct SessionRegistry {
    slots: Arc<Slots>,
}

/// Outcome of [`SessionRegistry::join`].
pub enum Joined {
    /// Already connected; nothing to do
    Existing(Arc<Session>),
    /// Connect to voice, then call [`JoinTicket::activate`]
    Pending(JoinTicket),
}

/// Holds the `Connecting` slot. Dropping it without activating (the voice
/// join failed) returns the id to `Idle`.
pub struct JoinTicket {
    id: SessionId,
    slots: Arc<Slots>,
    activated: bool,
}

fn lock(slots: &Slots) -> MutexGuard<'_, HashMap<SessionId, Slot>> {
    slots.lock().unwrap_or_else(|e| e.into_inner())
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&self, id: SessionId) -> Result<Joined> {
        let mut slots = lock(&self.slots);
        match slots.get(&id) {
            Some(Slot::Active(session)) => Ok(Joined::Existing(session.clone())),
            Some(Slot::Connecting) => Err(SessionError::AlreadyConnecting),
            None => {
                slots.insert(id, Slot::Connecting);
                debug!(session = %id, "connecting");
                Ok(Joined::Pending(JoinTicket {
                    id,
                    slots: self.slots.clone(),
                    activated: false,
                }))
            }
        }
    }

    /// The live session, or `NotConnected`.
    pub fn get(&self, id: SessionId) -> Result<Arc<Session>> {
        match lock(&self.slots).get(&id) {
            Some(Slot::Active(session)) => Ok(session.clone()),
            _ => Err(SessionError::NotConnected),
        }
    }

    pub fn state(&self, id: SessionId) -> ConnectionState {
        match lock(&self.slots).get(&id) {
            Some(Slot::Active(_)) => ConnectionState::Active,
            Some(Slot::Connecting) => ConnectionState::Connecting,
            None => ConnectionState::Idle,
        }
    }

    pub fn active_count(&self) -> usize {
        lock(&self.slots)
            .values()
            .filter(|slot| matches!(slot, Slot::Active(_)))
            .count()
    }

    /// Tear down the session for `id` if there is one.
    pub async fn teardown(&self, id: SessionId, reason: TeardownReason) -> bool {
        match self.get(id) {
            Ok(session) => session.teardown(reason).await,
            Err(_) => false,
        }
    }

    pub async fn shutdown(&self) {
        let sessions: Vec<_> = lock(&self.slots)
            .values()
            .filter_map(|slot| match slot {
                Slot::Active(session) => Some(session.clone()),
                Slot::Connecting => None,
            })
            .collect();
        for session in sessions {
            session.teardown(TeardownReason::Shutdown).await;
        }
    }
}

impl JoinTicket {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Create the session once the voice connection is up.
    pub fn activate(
        mut self,
        settings: SessionSettings,
        policy: Arc<dyn DurationPolicy>,
        player: Arc<dyn Player>,
        display: Arc<dyn DisplaySink>,
    ) -> Arc<Session> {
        let session = Session::spawn(self.id, settings, policy, player, display);

        let id = self.id;
        let slots = Arc::downgrade(&self.slots);
        let me = Arc::downgrade(&session);
        session.set_detach(Box::new(move || detach(slots, id, me)));

        lock(&self.slots).insert(self.id, Slot::Active(session.clone()));
        self.activated = true;
        session
    }
}

impl Drop for JoinTicket {
    fn drop(&mut self) {
        if self.activated {
            return;
        }
        let mut slots = lock(&self.slots);
        if matches!(slots.get(&self.id), Some(Slot::Connecting)) {
            slots.remove(&self.id);
            debug!(session = %self.id, "join abandoned");
        }
    }
}

/// Remove `id` only if it still maps to this very session.
fn detach(slots: Weak<Slots>, id: SessionId, session: Weak<Session>) {
    let Some(slots) = slots.upgrade() else {
        return;
    };
    let mut slots = lock(&slots);
    if let Some(Slot::Active(current)) = slots.get(&id) {
        if std::ptr::eq(Arc::as_ptr(current), session.as_ptr()) {
            slots.remove(&id);
        }
    }
}
