//! FIFO write queue for the active BLE link
//!
//! Fragments from every buffer share one queue, so bytes leave in the order
//! they were handed to the forwarder. At most one fragment is in flight: the
//! next one is released only when the previous write reports completion.

use std::collections::VecDeque;

use crate::chunking::{chunk, Fragment};
use crate::protocol::Mtu;

/// Pending outbound fragments plus the in-flight flag
#[derive(Debug, Default)]
pub struct WriteQueue {
    pending: VecDeque<Fragment>,
    in_flight: bool,
}

impl WriteQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `payload` as MTU-sized fragments; returns how many were queued
    pub fn enqueue(&mut self, payload: &[u8], mtu: Mtu) -> usize {
        let before = self.pending.len();
        self.pending.extend(chunk(payload, mtu));
        self.pending.len() - before
    }

    /// Pop the head fragment for dispatch.
    ///
    /// Marks a write in flight when a fragment is returned and clears the
    /// flag when the queue has drained. Called when a send finds the queue
    /// idle and again after each successful completion.
    pub fn next_for_dispatch(&mut self) -> Option<Fragment> {
        let next = self.pending.pop_front();
        self.in_flight = next.is_some();
        next
    }

    /// Drop every queued fragment and clear the in-flight flag; returns the
    /// number of fragments discarded
    pub fn flush(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        self.in_flight = false;
        dropped
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
