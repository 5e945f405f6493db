use std::cell::RefCell;
use std::future::Future;

use tracing::{debug, warn};

use crate::error::{ConsoleError, ConsoleResult};
use crate::notice::Notice;

#[derive(Debug, Clone, PartialEq)]
pub enum SlotState<T> {
    Idle,
    Pending,
    Success(T),
    Failed(Notice),
}

/// At most one outstanding request per named action slot.
///
/// A trigger while the slot is pending is rejected with
/// [`ConsoleError::Busy`] before the producer runs, so no network call is
/// made. A new trigger discards the previous outcome before its own request
/// resolves.
pub struct SingleFlight<T> {
    slot: &'static str,
    action: &'static str,
    state: RefCell<SlotState<T>>,
}

impl<T: Clone> SingleFlight<T> {
    /// `action` completes the sentence "Failed to ..." in error notices.
    pub fn new(slot: &'static str, action: &'static str) -> Self {
        Self {
            slot,
            action,
            state: RefCell::new(SlotState::Idle),
        }
    }

    pub async fn execute<F, Fut>(&self, producer: F) -> ConsoleResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ConsoleResult<T>>,
    {
        {
            let mut state = self.state.borrow_mut();
            if matches!(*state, SlotState::Pending) {
                warn!(slot = self.slot, "rejecting trigger while request is in flight");
                return Err(ConsoleError::Busy { slot: self.slot });
            }
            *state = SlotState::Pending;
        }
        debug!(slot = self.slot, "request issued");

        let guard = PendingGuard {
            slot: self.slot,
            state: &self.state,
        };
        let result = producer().await;
        std::mem::forget(guard);

        *self.state.borrow_mut() = match &result {
            Ok(value) => SlotState::Success(value.clone()),
            Err(err) => SlotState::Failed(Notice::failure(self.action, err)),
        };
        result
    }

    /// Drops a completed outcome. A pending request stays pending.
    pub fn clear(&self) {
        let mut state = self.state.borrow_mut();
        if !matches!(*state, SlotState::Pending) {
            *state = SlotState::Idle;
        }
    }

    pub fn slot(&self) -> &'static str {
        self.slot
    }

    #[cfg(test)]
    pub fn state(&self) -> SlotState<T> {
        self.state.borrow().clone()
    }

    pub fn is_pending(&self) -> bool {
        matches!(*self.state.borrow(), SlotState::Pending)
    }

    pub fn success(&self) -> Option<T> {
        match &*self.state.borrow() {
            SlotState::Success(value) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<Notice> {
        match &*self.state.borrow() {
            SlotState::Failed(notice) => Some(notice.clone()),
            _ => None,
        }
    }
}

/// Returns the slot to Idle when an in-flight `execute` is dropped.
struct PendingGuard<'a, T> {
    slot: &'static str,
    state: &'a RefCell<SlotState<T>>,
}

impl<T> Drop for PendingGuard<'_, T> {
    fn drop(&mut self) {
        let mut state = self.state.borrow_mut();
        if matches!(*state, SlotState::Pending) {
            warn!(slot = self.slot, "in-flight request cancelled");
            *state = SlotState::Idle;
        }
    }
}
