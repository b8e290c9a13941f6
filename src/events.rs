// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Relays event flags raised by services to the dispatcher, which returns them to the non-secure
//! world alongside the status of its next blocking call.

use arrayvec::ArrayVec;
use bitflags::bitflags;
use core::sync::atomic::{AtomicU32, Ordering};
use log::warn;
use spin::mutex::SpinMutex;

/// The maximum number of listeners which can be registered with a single [`EventSource`].
pub const MAX_LISTENERS: usize = 4;

bitflags! {
    /// Event flags. The meaning of each bit is defined by the services which raise it.
    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
    pub struct EventFlags: u32 {
        const _ = !0;
    }
}

/// Accumulates the flags broadcast by an [`EventSource`] until they are drained.
#[derive(Debug)]
pub struct EventListener {
    mask: EventFlags,
    pending: AtomicU32,
}

impl EventListener {
    /// Creates a listener which is only interested in the flags in `mask`.
    pub const fn new(mask: EventFlags) -> Self {
        Self {
            mask,
            pending: AtomicU32::new(0),
        }
    }

    /// Returns the flags which this listener accumulates.
    pub fn mask(&self) -> EventFlags {
        self.mask
    }

    /// Adds the given flags to the pending set, ignoring any outside the interest mask.
    pub fn raise(&self, flags: EventFlags) {
        self.pending
            .fetch_or((flags & self.mask).bits(), Ordering::AcqRel);
    }

    /// Atomically reads and clears the pending flags.
    pub fn drain(&self) -> EventFlags {
        EventFlags::from_bits_retain(self.pending.swap(0, Ordering::AcqRel))
    }
}

/// An error registering a listener.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EventError {
    /// The source already has [`MAX_LISTENERS`] listeners registered.
    TooManyListeners,
}

/// A source of events which services can broadcast to all registered listeners.
pub struct EventSource<'a> {
    listeners: SpinMutex<ArrayVec<&'a EventListener, MAX_LISTENERS>>,
}

impl<'a> EventSource<'a> {
    /// Creates an event source with no listeners.
    pub const fn new() -> Self {
        Self {
            listeners: SpinMutex::new(ArrayVec::new_const()),
        }
    }

    /// Registers a listener to receive future broadcasts.
    pub fn register(&self, listener: &'a EventListener) -> Result<(), EventError> {
        self.listeners.lock().try_push(listener).map_err(|_| {
            warn!("Event source full, can't register listener");
            EventError::TooManyListeners
        })
    }

    /// Raises the given flags on every registered listener.
    pub fn broadcast(&self, flags: EventFlags) {
        for listener in self.listeners.lock().iter() {
            listener.raise(flags);
        }
    }
}

impl Default for EventSource<'_> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_clears() {
        let listener = EventListener::new(EventFlags::all());
        listener.raise(EventFlags::from_bits_retain(0b101));
        listener.raise(EventFlags::from_bits_retain(0b010));
        assert_eq!(listener.drain(), EventFlags::from_bits_retain(0b111));
        assert_eq!(listener.drain(), EventFlags::empty());

        listener.raise(EventFlags::from_bits_retain(0b100));
        assert_eq!(listener.drain(), EventFlags::from_bits_retain(0b100));
    }

    #[test]
    fn mask_filters() {
        let listener = EventListener::new(EventFlags::from_bits_retain(0x0000_ffff));
        listener.raise(EventFlags::from_bits_retain(0x0001_0001));
        assert_eq!(listener.drain(), EventFlags::from_bits_retain(0x0000_0001));
    }

    #[test]
    fn broadcast_reaches_all_listeners() {
        let first = EventListener::new(EventFlags::all());
        let second = EventListener::new(EventFlags::from_bits_retain(0x2));
        let source = EventSource::new();
        source.register(&first).unwrap();
        source.register(&second).unwrap();

        source.broadcast(EventFlags::from_bits_retain(0x3));

        assert_eq!(first.drain(), EventFlags::from_bits_retain(0x3));
        assert_eq!(second.drain(), EventFlags::from_bits_retain(0x2));
    }

    #[test]
    fn register_too_many() {
        let listener = EventListener::new(EventFlags::all());
        let source = EventSource::new();
        for _ in 0..MAX_LISTENERS {
            source.register(&listener).unwrap();
        }
        assert_eq!(
            source.register(&listener),
            Err(EventError::TooManyListeners)
        );
    }
}
