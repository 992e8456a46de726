use std::sync::{
    atomic::{AtomicU8, Ordering},
    Arc,
};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Initial = 0,
    RangeLoading = 1,
    RangeLoaded = 2,
    Scanning = 3,
    RowReady = 4,
    Exhausted = 5,
    Failed = 6,
}

impl From<u8> for SessionState {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Initial,
            1 => Self::RangeLoading,
            2 => Self::RangeLoaded,
            3 => Self::Scanning,
            4 => Self::RowReady,
            5 => Self::Exhausted,
            6 => Self::Failed,
            _ => unreachable!("Invalid value for `SessionState`: {value}"),
        }
    }
}

/// Session state readable from other threads. Only the owning session writes it.
#[derive(Debug, Clone, Default)]
pub struct SharedState(Arc<AtomicU8>);

impl SharedState {
    pub fn get(&self) -> SessionState {
        self.0.load(Ordering::Acquire).into()
    }

    pub(super) fn set(&self, state: SessionState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_observes_updates() {
        let state = SharedState::default();
        let observer = state.clone();
        assert_eq!(observer.get(), SessionState::Initial);
        state.set(SessionState::Failed);
        assert_eq!(observer.get(), SessionState::Failed);
    }
}
