use std::collections::VecDeque;

use openxr::sys;
use parking_lot::Mutex;
use tracing::debug;

use crate::timing;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionStateChange {
    pub session: sys::Session,
    pub state: sys::SessionState,
    pub time: i64,
}

/// Events waiting to be returned by PollEvent, oldest first.
#[derive(Default)]
pub struct EventQueue {
    events: Mutex<VecDeque<SessionStateChange>>,
}

impl EventQueue {
    pub fn push_state(&self, session: sys::Session, state: sys::SessionState) {
        debug!("session {session:?} -> {state:?}");
        self.events.lock().push_back(SessionStateChange {
            session,
            state,
            time: timing::now(),
        });
    }

    pub fn push_states(&self, session: sys::Session, states: &[sys::SessionState]) {
        for &state in states {
            self.push_state(session, state);
        }
    }

    pub fn pop(&self) -> Option<SessionStateChange> {
        self.events.lock().pop_front()
    }

    /// Drops pending events of a destroyed session.
    pub fn forget_session(&self, session: sys::Session) {
        self.events.lock().retain(|event| event.session != session);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.events.lock().len()
    }
}

impl SessionStateChange {
    /// Writes this event into an application supplied `XrEventDataBuffer`.
    pub fn write_to(&self, buffer: &mut sys::EventDataBuffer) {
        let event = sys::EventDataSessionStateChanged {
            ty: sys::EventDataSessionStateChanged::TYPE,
            next: std::ptr::null(),
            session: self.session,
            state: self.state,
            time: sys::Time::from_nanos(self.time),
        };
        // The buffer is larger than any event and suitably aligned for one.
        unsafe {
            std::ptr::write(
                (buffer as *mut sys::EventDataBuffer).cast::<sys::EventDataSessionStateChanged>(),
                event,
            )
        };
    }
}

#[cfg(test)]
mod tests {
    use std::mem;

    use super::*;

    #[test]
    fn events_come_out_in_order() {
        let queue = EventQueue::default();
        let session = sys::Session::from_raw(5);
        queue.push_states(
            session,
            &[sys::SessionState::IDLE, sys::SessionState::READY],
        );
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop().unwrap().state, sys::SessionState::IDLE);
        assert_eq!(queue.pop().unwrap().state, sys::SessionState::READY);
        assert!(queue.pop().is_none());
    }

    #[test]
    fn destroyed_sessions_lose_their_events() {
        let queue = EventQueue::default();
        let kept = sys::Session::from_raw(1);
        let gone = sys::Session::from_raw(2);
        queue.push_state(gone, sys::SessionState::IDLE);
        queue.push_state(kept, sys::SessionState::IDLE);
        queue.forget_session(gone);
        assert_eq!(queue.pop().map(|e| e.session), Some(kept));
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn events_fit_the_event_buffer() {
        assert!(
            mem::size_of::<sys::EventDataSessionStateChanged>()
                <= mem::size_of::<sys::EventDataBuffer>()
        );
        assert!(
            mem::align_of::<sys::EventDataSessionStateChanged>()
                <= mem::align_of::<sys::EventDataBuffer>()
        );

        let mut buffer: sys::EventDataBuffer = unsafe { mem::zeroed() };
        let change = SessionStateChange {
            session: sys::Session::from_raw(9),
            state: sys::SessionState::FOCUSED,
            time: 42,
        };
        change.write_to(&mut buffer);
        let event = unsafe {
            &*(&buffer as *const sys::EventDataBuffer).cast::<sys::EventDataSessionStateChanged>()
        };
        assert_eq!(event.ty, sys::StructureType::EVENT_DATA_SESSION_STATE_CHANGED);
        assert_eq!(event.session, change.session);
        assert_eq!(event.state, sys::SessionState::FOCUSED);
        assert_eq!(event.time.as_nanos(), 42);
    }
}
