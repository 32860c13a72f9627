use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use xpchat_types::models::{Identity, RoomRef};

struct Inner {
    identity: Identity,
    room: RwLock<RoomRef>,
    member: AtomicBool,
    active: AtomicBool,
    online: AtomicBool,
}

/// Who is signed in, in which room, and whether they may write there.
///
/// Created on sign-in and ended on sign-out. Clones share state, so the
/// console flips membership once and the composer sees it.
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<Inner>,
}

impl SessionContext {
    pub fn new(identity: Identity, room: RoomRef, is_member: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                identity,
                room: RwLock::new(room),
                member: AtomicBool::new(is_member),
                active: AtomicBool::new(true),
                online: AtomicBool::new(true),
            }),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.inner.identity
    }

    pub fn room(&self) -> RoomRef {
        match self.inner.room.read() {
            Ok(room) => room.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn set_room(&self, room: RoomRef) {
        match self.inner.room.write() {
            Ok(mut current) => *current = room,
            Err(poisoned) => *poisoned.into_inner() = room,
        }
    }

    pub fn is_member(&self) -> bool {
        self.inner.member.load(Ordering::Acquire)
    }

    pub fn set_member(&self, member: bool) {
        self.inner.member.store(member, Ordering::Release);
    }

    /// False once the user signed out.
    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::Acquire)
    }

    pub fn end(&self) {
        self.inner.active.store(false, Ordering::Release);
        self.inner.member.store(false, Ordering::Release);
    }

    pub fn is_online(&self) -> bool {
        self.inner.online.load(Ordering::Acquire)
    }

    pub fn set_online(&self, online: bool) {
        self.inner.online.store(online, Ordering::Release);
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("identity", &self.inner.identity.id)
            .field("room", &self.room())
            .field("member", &self.is_member())
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_membership_and_end() {
        let session = SessionContext::new(
            Identity::new("u1", "ana"),
            RoomRef::new("europe", "general"),
            false,
        );
        let composer_view = session.clone();

        session.set_member(true);
        assert!(composer_view.is_member());

        session.set_room(RoomRef::new("europe", "random"));
        assert_eq!(composer_view.room().room_id, "random");

        session.end();
        assert!(!composer_view.is_active());
        assert!(!composer_view.is_member());
    }
}
