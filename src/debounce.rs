//! Timer-agnostic debounce: the last call within the window wins.
//!
//! `call` hands back a ticket carrying the delay; whoever owns a clock sleeps
//! for that long and then calls `fire` with the ticket's sequence number. Only
//! the newest ticket yields the value, so every earlier call is effectively
//! cancelled.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceTicket {
    pub seq: u64,
    pub delay: Duration,
}

#[derive(Debug)]
pub struct Debouncer<T> {
    window: Duration,
    seq: u64,
    pending: Option<T>,
}

impl<T> Debouncer<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            seq: 0,
            pending: None,
        }
    }

    pub fn call(&mut self, value: T) -> DebounceTicket {
        self.seq = self.seq.wrapping_add(1);
        self.pending = Some(value);
        DebounceTicket {
            seq: self.seq,
            delay: self.window,
        }
    }

    /// The pending value if `seq` belongs to the latest call.
    pub fn fire(&mut self, seq: u64) -> Option<T> {
        if seq != self.seq {
            return None;
        }
        self.pending.take()
    }

    pub fn cancel(&mut self) {
        self.seq = self.seq.wrapping_add(1);
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}
