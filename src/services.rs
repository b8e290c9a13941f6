// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! The static tables of trusted services and fast calls, and the per-service state.

use crate::{
    dispatcher::ServiceHandle,
    memory::SharedBuffer,
    scheduler::{Priority, Scheduler},
    smc::{Handle, HandleKind},
};
use arrayvec::ArrayVec;
use core::fmt::{self, Display, Formatter};

/// The maximum number of services which can be registered.
pub const MAX_SERVICES: usize = 16;

/// The maximum length in bytes of a service name which can be discovered.
pub const MAX_NAME_LEN: usize = 32;

/// The index of a service in the registry.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ServiceId(pub u16);

impl ServiceId {
    fn index(self) -> usize {
        self.0.into()
    }
}

/// A trusted service which runs in its own thread.
pub struct ServiceDescriptor<S: Scheduler> {
    /// The name by which the non-secure world discovers the service. `None` marks an unused slot.
    pub name: Option<&'static str>,
    /// The priority of the service thread. This must be strictly between
    /// `S::NORMAL_PRIORITY` and `S::HIGHEST_PRIORITY`.
    pub priority: Priority,
    /// The main function of the service thread.
    pub entry: fn(ServiceHandle<'static, S>),
}

/// A stateless function which the non-secure world can call without yielding.
#[derive(Copy, Clone, Debug)]
pub struct FastCallDescriptor {
    /// The name of the fast call, for logging.
    pub name: &'static str,
    /// The fast call number. This must be equal to the index of the descriptor in its table.
    pub code: u16,
    /// The function to call with the caller's buffer. It runs at the highest priority so must
    /// return quickly.
    pub function: fn(SharedBuffer) -> i32,
}

/// A problem with the service or fast call tables found at boot.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RegistryError {
    /// More services were given than there are slots in the state store.
    TooManyServices {
        /// The number of services given.
        count: usize,
    },
    /// A service's priority is outside the band reserved for services.
    PriorityOutOfBand {
        /// The index of the service.
        index: usize,
        /// Its priority.
        priority: Priority,
    },
    /// A service's name is too long to ever be discovered.
    NameTooLong {
        /// The index of the service.
        index: usize,
    },
    /// A fast call's code doesn't match its position in the table.
    FastCallCodeMismatch {
        /// The position of the fast call in the table.
        index: usize,
        /// The code in the descriptor.
        code: u16,
    },
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::TooManyServices { count } => {
                write!(f, "{count} services given but only {MAX_SERVICES} slots")
            }
            Self::PriorityOutOfBand { index, priority } => {
                write!(f, "service {index} has out of band priority {}", priority.0)
            }
            Self::NameTooLong { index } => {
                write!(f, "service {index} name is longer than {MAX_NAME_LEN} bytes")
            }
            Self::FastCallCodeMismatch { index, code } => {
                write!(f, "fast call at index {index} has code {code}")
            }
        }
    }
}

/// The mutable state of a single service.
#[derive(Clone, Debug)]
pub(crate) struct ServiceState<T> {
    /// The status reported by the service when it last finished a request, or `None` if it has
    /// never finished one.
    pub status: Option<i32>,
    /// The service thread, while it is waiting for a new request. `None` while it is processing
    /// one, or before it has started.
    pub waiting: Option<T>,
    /// The buffer for the current request. Only meaningful while `waiting` is `None`.
    pub request: SharedBuffer,
}

impl<T> ServiceState<T> {
    const fn new() -> Self {
        Self {
            status: None,
            waiting: None,
            request: SharedBuffer::EMPTY,
        }
    }
}

/// The service and fast call tables, validated at boot.
pub struct Registry<'a, S: Scheduler> {
    services: &'a [ServiceDescriptor<S>],
    fast_calls: &'a [FastCallDescriptor],
}

impl<'a, S: Scheduler> Registry<'a, S> {
    /// Checks the structural invariants of the given tables and wraps them in a registry.
    pub fn new(
        services: &'a [ServiceDescriptor<S>],
        fast_calls: &'a [FastCallDescriptor],
    ) -> Result<Self, RegistryError> {
        if services.len() > MAX_SERVICES {
            return Err(RegistryError::TooManyServices {
                count: services.len(),
            });
        }
        for (index, service) in services.iter().enumerate() {
            let Some(name) = service.name else {
                continue;
            };
            if service.priority <= S::NORMAL_PRIORITY || service.priority >= S::HIGHEST_PRIORITY {
                return Err(RegistryError::PriorityOutOfBand {
                    index,
                    priority: service.priority,
                });
            }
            if name.len() > MAX_NAME_LEN {
                return Err(RegistryError::NameTooLong { index });
            }
        }
        for (index, fast_call) in fast_calls.iter().enumerate() {
            if usize::from(fast_call.code) != index {
                return Err(RegistryError::FastCallCodeMismatch {
                    index,
                    code: fast_call.code,
                });
            }
        }
        Ok(Self {
            services,
            fast_calls,
        })
    }

    /// Creates a state record for every slot in the service table, in the same order.
    pub(crate) fn new_state_store(&self) -> ArrayVec<ServiceState<S::Thread>, MAX_SERVICES> {
        self.services.iter().map(|_| ServiceState::new()).collect()
    }

    /// Returns the handle of the first populated service with the given name.
    pub fn find_by_name(&self, name: &[u8]) -> Option<Handle> {
        self.populated()
            .find(|(_, service_name, _)| service_name.as_bytes() == name)
            .map(|(id, _, _)| Handle::service(id))
    }

    /// Returns the descriptor of the service with the given ID, if it is populated.
    pub fn descriptor_at(&self, id: ServiceId) -> Option<&'a ServiceDescriptor<S>> {
        self.services
            .get(id.index())
            .filter(|service| service.name.is_some())
    }

    /// Returns the fast call with the given index.
    pub fn fast_call_at(&self, index: u16) -> Option<&'a FastCallDescriptor> {
        self.fast_calls.get(usize::from(index))
    }

    /// Decodes a handle which must refer to a populated service.
    pub fn service_id(&self, handle: Handle) -> Option<ServiceId> {
        match handle.kind() {
            HandleKind::Service(id) => self.descriptor_at(id).map(|_| id),
            _ => None,
        }
    }

    /// Returns the ID, name and descriptor of each populated service, in table order.
    pub fn populated(
        &self,
    ) -> impl Iterator<Item = (ServiceId, &'a str, &'a ServiceDescriptor<S>)> + use<'a, S> {
        self.services
            .iter()
            .enumerate()
            .filter_map(|(index, service)| {
                // The table has at most `MAX_SERVICES` entries, so the index fits.
                let id = ServiceId(index as u16);
                service.name.map(|name| (id, name, service))
            })
    }
}
