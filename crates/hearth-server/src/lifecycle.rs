//! [`LifecycleState`]: the server-wide state machine spec.md §4.7
//! describes — `Initial → Starting → Running → ShuttingDown → Shutdown`.
//!
//! grounded on the teacher's `xitca_server::server::future::ServerFuture`
//! state tracking, collapsed from a future-driven state machine into a
//! plain atomic cell read by [`ServerHandle`](crate::handle::ServerHandle)
//! and written by [`start`](crate::builder::Builder::start) /
//! [`stop`](crate::handle::ServerHandle::stop).

use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    Initial,
    Starting,
    Running,
    ShuttingDown,
    Shutdown,
}

impl LifecycleState {
    fn from_tag(tag: u8) -> Self {
        match tag {
            0 => Self::Initial,
            1 => Self::Starting,
            2 => Self::Running,
            3 => Self::ShuttingDown,
            _ => Self::Shutdown,
        }
    }

    fn tag(self) -> u8 {
        match self {
            Self::Initial => 0,
            Self::Starting => 1,
            Self::Running => 2,
            Self::ShuttingDown => 3,
            Self::Shutdown => 4,
        }
    }
}

pub(crate) struct LifecycleCell(AtomicU8);

impl LifecycleCell {
    pub(crate) fn new(initial: LifecycleState) -> Self {
        Self(AtomicU8::new(initial.tag()))
    }

    pub(crate) fn get(&self) -> LifecycleState {
        LifecycleState::from_tag(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: LifecycleState) {
        self.0.store(state.tag(), Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_state() {
        let cell = LifecycleCell::new(LifecycleState::Initial);
        for state in [
            LifecycleState::Starting,
            LifecycleState::Running,
            LifecycleState::ShuttingDown,
            LifecycleState::Shutdown,
        ] {
            cell.set(state);
            assert_eq!(cell.get(), state);
        }
    }
}
