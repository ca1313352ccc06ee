//! One-shot termination barrier
//!
//! Every scavenger task registers with [`Barrier::start`] before any task
//! runs. A task that found no work calls [`Barrier::wait`]; the last task to
//! arrive declares the episode done and wakes everybody. A task that
//! published work calls [`Barrier::notify_all`] so that parked siblings
//! return from `wait` and look again.
//!
//! Wake-ups without new work are harmless: the woken task drains nothing and
//! waits again.

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct State {
    tasks: usize,
    waiting: usize,
    done: bool,
}

/// Termination barrier for one scavenge
#[derive(Debug, Default)]
pub struct Barrier {
    state: Mutex<State>,
    condvar: Condvar,
}

impl Barrier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one task
    pub fn start(&self) {
        self.state.lock().tasks += 1;
    }

    /// Park until woken or until every registered task is waiting
    ///
    /// Returns whether the episode is done.
    pub fn wait(&self) -> bool {
        let mut state = self.state.lock();
        state.waiting += 1;
        if state.waiting >= state.tasks {
            state.done = true;
            self.condvar.notify_all();
        } else if !state.done {
            self.condvar.wait(&mut state);
        }
        state.waiting -= 1;
        state.done
    }

    /// Wake parked tasks so they can pick up newly published work
    pub fn notify_all(&self) {
        let state = self.state.lock();
        if state.waiting > 0 {
            self.condvar.notify_all();
        }
    }

    /// End the episode early, releasing every waiter
    ///
    /// Used when a task dies so its siblings are not left parked.
    pub fn abort(&self) {
        let mut state = self.state.lock();
        state.done = true;
        self.condvar.notify_all();
    }

    /// Forget all tasks for a new episode
    pub fn reset(&self) {
        let mut state = self.state.lock();
        debug_assert_eq!(state.waiting, 0);
        *state = State::default();
    }

    pub fn done(&self) -> bool {
        self.state.lock().done
    }

    /// Registered tasks
    pub fn tasks(&self) -> usize {
        self.state.lock().tasks
    }
}
