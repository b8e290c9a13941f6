// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Secure-world dispatcher for trusted services called from the non-secure world via SMC.
//!
//! The non-secure world calls into the secure world with a handle identifying the target, a
//! buffer in non-secure memory and a timeout. Most handles identify a long-running service with
//! its own thread: the dispatcher hands it the buffer, resumes it and blocks the caller until the
//! service yields back with [`ServiceHandle::wait_request`]. Fast calls run synchronously instead,
//! and a few reserved handles are used for discovery, status queries, idling and version checks.
//!
//! The thread scheduler itself is provided by the surrounding system through the [`Scheduler`]
//! trait.

#![cfg_attr(not(test), no_std)]

pub mod dispatcher;
pub mod events;
pub mod logger;
pub mod memory;
pub mod platform;
pub mod scheduler;
pub mod services;
pub mod smc;

pub use crate::{
    dispatcher::{Dispatcher, ServiceHandle, smc_entry},
    events::{EventFlags, EventListener, EventSource},
    memory::{NsWindow, SharedBuffer},
    scheduler::{Priority, Scheduler, WakeReason},
    services::{FastCallDescriptor, RegistryError, ServiceDescriptor, ServiceId},
    smc::{DispatchResult, Handle, Status},
};
