//! # Rendezvous Job Queue
//!
//! Zero-capacity hand-off between the producer and the workers. A `submit`
//! only completes once a worker has taken the item, and an item is counted
//! as queued from the moment a worker receives it, so `currently_queued`
//! never exceeds the number of workers.
//!
//! Counters are mutated under one lock so that any snapshot satisfies
//! `total_submitted == total_finished + currently_queued`.
//!
//! Once closed, the queue hands out no further items: blocked producers are
//! released with `QueueClosed` and idle workers stop taking.

use crossbeam::channel::{bounded, select, Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, trace};

use crate::error::{BatchMatchError, Result};

/// Snapshot of queue bookkeeping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounters {
    /// Received by a worker and not yet finished
    pub currently_queued: usize,
    pub total_submitted: usize,
    pub total_finished: usize,
    /// Finished items whose work failed
    pub total_failed: usize,
}

#[derive(Default)]
struct CounterState {
    counters: QueueCounters,
    /// Hand-offs completed on the producer side; a worker may not have
    /// counted the item yet
    handed_off: usize,
}

/// One-shot broadcast: firing it disconnects the channel, which wakes every
/// `select!` waiting on the listener.
pub(crate) struct Signal {
    trigger: Mutex<Option<Sender<()>>>,
    listener: Receiver<()>,
    fired: AtomicBool,
}

impl Signal {
    pub(crate) fn new() -> Self {
        let (trigger, listener) = bounded(0);
        Self {
            trigger: Mutex::new(Some(trigger)),
            listener,
            fired: AtomicBool::new(false),
        }
    }

    /// Returns true for the call that actually fired the signal
    pub(crate) fn fire(&self) -> bool {
        self.fired.store(true, Ordering::Release);
        self.trigger.lock().take().is_some()
    }

    pub(crate) fn is_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    pub(crate) fn listener(&self) -> &Receiver<()> {
        &self.listener
    }
}

/// Synchronous hand-off queue with drain tracking
pub struct JobQueue<T> {
    sender: Sender<T>,
    receiver: Receiver<T>,
    counters: Mutex<CounterState>,
    drained: Condvar,
    closed: Signal,
    close_reason: Mutex<Option<String>>,
}

impl<T> JobQueue<T> {
    pub fn new() -> Self {
        let (sender, receiver) = bounded(0);
        Self {
            sender,
            receiver,
            counters: Mutex::new(CounterState::default()),
            drained: Condvar::new(),
            closed: Signal::new(),
            close_reason: Mutex::new(None),
        }
    }

    /// Hand `item` to a worker, blocking until one takes it.
    ///
    /// Fails with `QueueClosed` if the queue is closed before or while
    /// waiting; the item is dropped in that case.
    pub fn submit(&self, item: T) -> Result<()> {
        if self.closed.is_fired() {
            return Err(self.closed_error());
        }

        let delivered = select! {
            send(self.sender, item) -> res => res.is_ok(),
            recv(self.closed.listener()) -> _ => false,
        };

        if delivered {
            self.counters.lock().handed_off += 1;
            trace!("QUEUE: item handed to worker");
            Ok(())
        } else {
            Err(self.closed_error())
        }
    }

    /// Wait for the next item. Returns `None` once `shutdown` fires or the
    /// queue is closed.
    pub(crate) fn take(&self, shutdown: &Signal) -> Option<T> {
        if shutdown.is_fired() || self.closed.is_fired() {
            return None;
        }
        let item = select! {
            recv(self.receiver) -> item => item.ok(),
            recv(shutdown.listener()) -> _ => None,
            recv(self.closed.listener()) -> _ => None,
        };
        let item = item?;

        let mut state = self.counters.lock();
        state.counters.currently_queued += 1;
        state.counters.total_submitted += 1;
        Some(item)
    }

    /// Record that a taken item has been fully processed
    pub fn finish(&self, failed: bool) {
        let mut state = self.counters.lock();
        let counters = &mut state.counters;
        counters.total_finished += 1;
        if failed {
            counters.total_failed += 1;
        }
        counters.currently_queued = counters.currently_queued.saturating_sub(1);
        if Self::is_drained(&state) {
            self.drained.notify_all();
        }
    }

    fn is_drained(state: &CounterState) -> bool {
        state.counters.currently_queued == 0 && state.counters.total_submitted >= state.handed_off
    }

    /// Block until nothing is queued. The predicate is re-checked on every
    /// wake, so spurious or early wakeups are harmless.
    pub fn wait_until_drained(&self) {
        let mut state = self.counters.lock();
        while !Self::is_drained(&state) {
            self.drained.wait(&mut state);
        }
    }

    /// Reject all further submissions, releasing any producer blocked in
    /// `submit`. The first reason wins.
    pub fn close(&self, reason: impl Into<String>) {
        {
            let mut slot = self.close_reason.lock();
            if slot.is_none() {
                *slot = Some(reason.into());
            }
        }
        if self.closed.fire() {
            debug!("QUEUE: closed to new submissions");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_fired()
    }

    fn closed_error(&self) -> BatchMatchError {
        BatchMatchError::QueueClosed {
            reason: self
                .close_reason
                .lock()
                .clone()
                .unwrap_or_else(|| "queue closed".to_string()),
        }
    }

    pub fn counters(&self) -> QueueCounters {
        self.counters.lock().counters
    }

    pub fn currently_queued(&self) -> usize {
        self.counters.lock().counters.currently_queued
    }

    pub fn total_submitted(&self) -> usize {
        self.counters.lock().counters.total_submitted
    }

    pub fn total_finished(&self) -> usize {
        self.counters.lock().counters.total_finished
    }
}

impl<T> Default for JobQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
