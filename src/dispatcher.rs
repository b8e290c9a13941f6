// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! The SMC entry point through which the non-secure world calls trusted services, and the wait
//! primitive through which services hand control back.
//!
//! Exactly one non-secure caller can be inside the dispatcher at a time. A call to a service
//! resumes the service thread and blocks the caller until the service calls
//! [`ServiceHandle::wait_request`] or the timeout expires, whichever comes first. Either way the
//! caller gets `INTR` back and is expected to call again (or query the status) until the service
//! reports that it has finished.

use crate::{
    events::EventListener,
    memory::{NsWindow, SharedBuffer},
    platform::{Platform, PlatformImpl},
    scheduler::{Scheduler, WakeReason},
    services::{
        FastCallDescriptor, MAX_NAME_LEN, MAX_SERVICES, Registry, RegistryError,
        ServiceDescriptor, ServiceId, ServiceState,
    },
    smc::{DispatchResult, Handle, HandleKind, Status, VERSION},
};
use arrayvec::ArrayVec;
use core::time::Duration;
use log::{debug, error, info, trace};
use spin::mutex::SpinMutex;

/// State shared between the dispatcher and the service threads.
struct DispatchState<T> {
    /// The non-secure caller, while it is blocked in the dispatcher.
    caller: Option<T>,
    /// One record per slot in the service table.
    services: ArrayVec<ServiceState<T>, MAX_SERVICES>,
}

/// The trusted service dispatcher.
pub struct Dispatcher<'a, S: Scheduler> {
    scheduler: &'a S,
    window: NsWindow,
    registry: Registry<'a, S>,
    events: &'a EventListener,
    state: SpinMutex<DispatchState<S::Thread>>,
}

impl<'a, S: Scheduler> Dispatcher<'a, S> {
    /// Validates the service and fast call tables and creates a dispatcher for them.
    ///
    /// The non-secure memory window comes from the platform. An error here means the tables are
    /// inconsistent, and the system must not continue to boot.
    pub fn new(
        scheduler: &'a S,
        services: &'a [ServiceDescriptor<S>],
        fast_calls: &'a [FastCallDescriptor],
        events: &'a EventListener,
    ) -> Result<Self, RegistryError> {
        let registry = Registry::new(services, fast_calls)
            .inspect_err(|e| error!("Invalid trusted service tables: {e}"))?;
        let state = DispatchState {
            caller: None,
            services: registry.new_state_store(),
        };
        Ok(Self {
            scheduler,
            window: PlatformImpl::non_secure_window(),
            registry,
            events,
            state: SpinMutex::new(state),
        })
    }

    /// Returns the window of memory which callers may pass buffers in.
    pub fn window(&self) -> &NsWindow {
        &self.window
    }

    /// Returns the service and fast call tables.
    pub fn registry(&self) -> &Registry<'a, S> {
        &self.registry
    }

    /// Handles a call from the non-secure world.
    ///
    /// `data` and `len` describe a buffer in non-secure memory, except for status queries where
    /// `data` is the handle of the service to query. `timeout_us` bounds how long the caller may be
    /// blocked, and is clamped to the platform maximum.
    pub fn dispatch(
        &self,
        handle: Handle,
        data: usize,
        len: usize,
        timeout_us: u32,
    ) -> DispatchResult {
        trace!("dispatch({handle:?}, {data:#x}, {len:#x}, {timeout_us})");
        let request = match handle.kind() {
            HandleKind::StatusQuery => Request::StatusQuery(data),
            HandleKind::FastCall(index) => return self.fast_call(index, data, len),
            HandleKind::Version => return VERSION.into(),
            HandleKind::Discovery => return self.discover(data, len),
            HandleKind::Idle => Request::Idle,
            _ => {
                let Some(buffer) = self.window.buffer(data, len) else {
                    debug!("Rejecting buffer {data:#x}+{len:#x} for {handle}");
                    return Status::Invalid.into();
                };
                let Some(id) = self.registry.service_id(handle) else {
                    debug!("Rejecting bad handle {handle}");
                    return Status::BadHandle.into();
                };
                Request::Service(id, buffer)
            }
        };

        let timeout = Duration::from_micros(timeout_us.into()).min(PlatformImpl::MAX_TIMEOUT);
        self.block_caller(request, timeout)
    }

    /// Runs a fast call synchronously at the highest priority.
    fn fast_call(&self, index: u16, data: usize, len: usize) -> DispatchResult {
        let Some(buffer) = self.window.buffer(data, len) else {
            debug!("Rejecting buffer {data:#x}+{len:#x} for fast call {index}");
            return Status::Invalid.into();
        };
        let Some(fast_call) = self.registry.fast_call_at(index) else {
            debug!("No fast call {index}");
            return Status::BadHandle.into();
        };
        trace!("Fast call {}", fast_call.name);
        let previous = self.scheduler.set_priority(S::HIGHEST_PRIORITY);
        let result = (fast_call.function)(buffer);
        self.scheduler.set_priority(previous);
        result.into()
    }

    /// Looks up the service named by the NUL-terminated string in the given buffer.
    fn discover(&self, data: usize, len: usize) -> DispatchResult {
        let Some(buffer) = self.window.buffer(data, len) else {
            debug!("Rejecting discovery buffer {data:#x}+{len:#x}");
            return Status::Invalid.into();
        };
        if buffer.is_empty() {
            return Status::NoEnt.into();
        }
        // Make sure the caller's string is terminated within the buffer, whatever they passed.
        if buffer.write_bytes(len - 1, &[0]).is_err() {
            return Status::Invalid.into();
        }

        let mut name_buffer = [0; MAX_NAME_LEN + 1];
        let name = &mut name_buffer[..len.min(MAX_NAME_LEN + 1)];
        if buffer.read_bytes(0, name).is_err() {
            return Status::Invalid.into();
        }
        let Some(name_len) = name.iter().position(|&byte| byte == 0) else {
            // Longer than any registered name.
            return Status::NoEnt.into();
        };

        match self.registry.find_by_name(&name[..name_len]) {
            Some(handle) => {
                debug!("Discovered service {handle}");
                handle.into()
            }
            None => Status::NoEnt.into(),
        }
    }

    /// Resumes the target of the request, if any, and blocks the caller until a service yields or
    /// the timeout expires.
    fn block_caller(&self, request: Request, timeout: Duration) -> DispatchResult {
        let mut lock = self.scheduler.lock();
        let current = self.scheduler.current();

        let target = {
            let mut state = self.state.lock();
            if state.caller.is_some() {
                debug!("Caller slot already occupied");
                return Status::Busy.into();
            }
            let target = match request {
                Request::Idle => None,
                Request::StatusQuery(queried) => {
                    let Some(service) = u32::try_from(queried)
                        .ok()
                        .and_then(|queried| self.registry.service_id(Handle(queried)))
                    else {
                        debug!("Rejecting bad handle {queried:#x} for status query");
                        return Status::BadHandle.into();
                    };
                    let service = &state.services[usize::from(service.0)];
                    if service.waiting.is_some() {
                        return service.status.unwrap_or(Status::NoEnt.into()).into();
                    }
                    None
                }
                Request::Service(id, buffer) => {
                    let service = &mut state.services[usize::from(id.0)];
                    let Some(thread) = service.waiting.take() else {
                        debug!("Service {} is busy", id.0);
                        return Status::Busy.into();
                    };
                    service.request = buffer;
                    Some(thread)
                }
            };
            state.caller = Some(current);
            target
        };

        if let Some(thread) = target {
            self.scheduler
                .resume(&mut lock, thread, Status::Ok.into());
        }
        let status = match self.scheduler.suspend(&mut lock, Some(timeout)) {
            WakeReason::Resumed(message) => message,
            WakeReason::TimedOut => {
                let mut state = self.state.lock();
                if state.caller == Some(current) {
                    state.caller = None;
                }
                Status::Intr.into()
            }
        };
        drop(lock);

        DispatchResult {
            status,
            flags: self.events.drain(),
        }
    }

    /// Records the status of the given service's most recent request.
    fn set_status(&self, id: ServiceId, status: i32) {
        let _lock = self.scheduler.lock();
        self.state.lock().services[usize::from(id.0)].status = Some(status);
    }

    /// Returns the buffer of the given service's current request.
    fn request(&self, id: ServiceId) -> SharedBuffer {
        let _lock = self.scheduler.lock();
        self.state.lock().services[usize::from(id.0)].request
    }

    /// Hands control back to the blocked caller, if there is one, and suspends the current service
    /// thread until the next request for it.
    fn wait_request(&self, id: ServiceId) -> WakeReason {
        let mut lock = self.scheduler.lock();
        {
            let mut state = self.state.lock();
            if let Some(caller) = state.caller.take() {
                self.scheduler
                    .resume(&mut lock, caller, Status::Intr.into());
            }
            state.services[usize::from(id.0)].waiting = Some(self.scheduler.current());
        }
        self.scheduler.suspend(&mut lock, None)
    }
}

impl<S: Scheduler> Dispatcher<'static, S> {
    /// Starts a thread for each populated service in the table.
    pub fn start(&'static self) {
        for (id, name, service) in self.registry.populated() {
            info!(
                "Starting trusted service {name} at priority {}",
                service.priority.0
            );
            let entry = service.entry;
            let handle = ServiceHandle {
                dispatcher: self,
                id,
            };
            self.scheduler
                .spawn(service.priority, name, move || entry(handle));
        }
    }
}

/// What a blocking dispatcher call is for.
#[derive(Copy, Clone, Debug)]
enum Request {
    /// Give the secure world time to run.
    Idle,
    /// Query the status of the service with the given (unvalidated) handle.
    StatusQuery(usize),
    /// Start a new request for the given service.
    Service(ServiceId, SharedBuffer),
}

/// The interface through which a service thread interacts with the dispatcher.
pub struct ServiceHandle<'a, S: Scheduler> {
    dispatcher: &'a Dispatcher<'a, S>,
    id: ServiceId,
}

impl<S: Scheduler> Clone for ServiceHandle<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: Scheduler> Copy for ServiceHandle<'_, S> {}

impl<S: Scheduler> ServiceHandle<'_, S> {
    /// Returns the ID of the service.
    pub fn id(&self) -> ServiceId {
        self.id
    }

    /// Returns the name the service was registered with.
    pub fn name(&self) -> &'static str {
        self.dispatcher
            .registry
            .descriptor_at(self.id)
            .and_then(|service| service.name)
            .unwrap_or_default()
    }

    /// Returns the handle by which the non-secure world calls this service.
    pub fn handle(&self) -> Handle {
        Handle::service(self.id)
    }

    /// Returns the buffer passed with the current request.
    ///
    /// The non-secure world can modify the contents at any time, so anything read from it must be
    /// validated after it has been copied.
    pub fn request(&self) -> SharedBuffer {
        self.dispatcher.request(self.id)
    }

    /// Sets the status which status queries return once the service is waiting.
    pub fn set_status(&self, status: i32) {
        self.dispatcher.set_status(self.id, status);
    }

    /// Hands control back to the non-secure caller and waits for the next request.
    ///
    /// Long-running services must call this periodically to give the non-secure world a chance to
    /// run, even if they haven't finished the current request yet.
    pub fn wait_request(&self) -> WakeReason {
        self.dispatcher.wait_request(self.id)
    }

    /// Records the status of the current request and waits for the next one.
    pub fn complete(&self, status: i32) -> WakeReason {
        self.set_status(status);
        self.wait_request()
    }
}

/// The entry point for SMCs from the non-secure world, with the result packed as it is returned in
/// registers.
pub fn smc_entry<S: Scheduler>(
    dispatcher: &Dispatcher<'_, S>,
    handle: u32,
    data: usize,
    len: usize,
    timeout_us: u32,
) -> u64 {
    dispatcher
        .dispatch(Handle(handle), data, len, timeout_us)
        .to_wire()
}
