use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    Uninitialized,
    Initializing,
    Ready,
    Closing,
    Closed,
    Failed,
}

impl WindowState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }

    /// Device resources may only exist in these states.
    pub fn allows_device_resources(self) -> bool {
        matches!(self, Self::Ready | Self::Closing)
    }
}

pub fn can_transition(from: WindowState, to: WindowState) -> bool {
    matches!(
        (from, to),
        (WindowState::Uninitialized, WindowState::Initializing)
            | (WindowState::Initializing, WindowState::Ready)
            | (WindowState::Initializing, WindowState::Failed)
            | (WindowState::Ready, WindowState::Closing)
            | (WindowState::Closing, WindowState::Closed)
    )
}

/// Window state shared between the host and its window thread.
#[derive(Debug, Clone)]
pub struct SharedState {
    inner: Arc<Mutex<WindowState>>,
}

impl Default for SharedState {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(WindowState::Uninitialized)),
        }
    }
}

impl SharedState {
    pub fn get(&self) -> WindowState {
        self.inner
            .lock()
            .map(|state| *state)
            .unwrap_or(WindowState::Failed)
    }

    /// Applies `next` if the transition table allows it; returns whether the
    /// state changed.
    pub fn advance(&self, next: WindowState) -> bool {
        let Ok(mut state) = self.inner.lock() else {
            return false;
        };
        if !can_transition(*state, next) {
            tracing::debug!(from = ?*state, to = ?next, "ignored window state transition");
            return false;
        }
        *state = next;
        true
    }
}
