// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Types and helpers for the trusted service SMC interface: handle encoding, status codes and the
//! packed result returned to the non-secure world.

use crate::{events::EventFlags, services::ServiceId};
use core::fmt::{self, Debug, Display, Formatter};
use num_enum::{IntoPrimitive, TryFromPrimitive};

const FAST_CALL_MASK: u32 = 0xffff_0000;
const FAST_CALL_TAG: u32 = 0xfa57_0000;
const FAST_CALL_INDEX_MASK: u32 = !FAST_CALL_MASK;

/// The handle of the first service in the state store.
pub const SERVICE_HANDLE_BASE: u32 = 0x1000;

/// The distance between the handles of two consecutive services.
pub const SERVICE_HANDLE_STRIDE: u32 = 0x20;

/// The version of the dispatcher interface, returned for [`Handle::VERSION`].
pub const VERSION: i32 = 0x0100_0000;

/// Status codes returned to the non-secure world.
#[derive(Copy, Clone, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(i32)]
pub enum Status {
    /// The call completed successfully.
    Ok = 0,
    /// The call was interrupted, e.g. because the service yielded or the timeout expired. The
    /// caller should call again.
    Intr = -1,
    /// No service matches the request.
    NoEnt = -2,
    /// The buffer passed by the caller is not within the non-secure memory window.
    Invalid = -3,
    /// The handle does not identify a service or fast call.
    BadHandle = -4,
    /// The service already exists.
    Exist = -5,
    /// There are no free service slots.
    NoHandles = -6,
    /// The service is still processing a previous request.
    Busy = -7,
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let name = match self {
            Self::Ok => "OK",
            Self::Intr => "INTR",
            Self::NoEnt => "NOENT",
            Self::Invalid => "INVALID",
            Self::BadHandle => "BADH",
            Self::Exist => "EXIST",
            Self::NoHandles => "NHND",
            Self::Busy => "BUSY",
        };
        f.write_str(name)
    }
}

/// What a [`Handle`] refers to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HandleKind {
    /// The handle used for the one-time entry into the non-secure world. It is not a valid target
    /// of a dispatcher call.
    Trampoline,
    /// Looks up a service by name.
    Discovery,
    /// Queries the status of a service.
    StatusQuery,
    /// Gives the secure world some time to run without making a request.
    Idle,
    /// Returns the interface version.
    Version,
    /// The fast call with the given index.
    FastCall(u16),
    /// The service with the given index, if it is registered.
    Service(ServiceId),
    /// Not a valid handle.
    Invalid,
}

/// An opaque value passed by the non-secure world to identify the target of a call.
#[derive(Copy, Clone, Eq, Hash, PartialEq)]
#[repr(transparent)]
pub struct Handle(pub u32);

impl Handle {
    /// Handle used for the initial transfer of control to the non-secure world.
    pub const TRAMPOLINE: Self = Self(0);
    /// Handle of the discovery meta-call.
    pub const DISCOVERY: Self = Self(1);
    /// Handle of the status query meta-call.
    pub const STATUS_QUERY: Self = Self(2);
    /// Handle of the idle meta-call.
    pub const IDLE: Self = Self(3);
    /// Handle of the version meta-call.
    pub const VERSION: Self = Self(4);

    /// Returns the handle of the fast call with the given index.
    pub const fn fast_call(index: u16) -> Self {
        Self(FAST_CALL_TAG | index as u32)
    }

    /// Returns the handle of the service with the given ID.
    pub const fn service(id: ServiceId) -> Self {
        Self(SERVICE_HANDLE_BASE + id.0 as u32 * SERVICE_HANDLE_STRIDE)
    }

    /// Returns what kind of target this handle refers to.
    ///
    /// This only decodes the handle; it doesn't check whether a fast call or service with the
    /// decoded index actually exists.
    pub fn kind(self) -> HandleKind {
        match self {
            Self::TRAMPOLINE => HandleKind::Trampoline,
            Self::DISCOVERY => HandleKind::Discovery,
            Self::STATUS_QUERY => HandleKind::StatusQuery,
            Self::IDLE => HandleKind::Idle,
            Self::VERSION => HandleKind::Version,
            Self(value) if value & FAST_CALL_MASK == FAST_CALL_TAG => {
                HandleKind::FastCall((value & FAST_CALL_INDEX_MASK) as u16)
            }
            Self(value) => {
                let Some(offset) = value.checked_sub(SERVICE_HANDLE_BASE) else {
                    return HandleKind::Invalid;
                };
                if offset % SERVICE_HANDLE_STRIDE != 0 {
                    return HandleKind::Invalid;
                }
                match u16::try_from(offset / SERVICE_HANDLE_STRIDE) {
                    Ok(index) => HandleKind::Service(ServiceId(index)),
                    Err(_) => HandleKind::Invalid,
                }
            }
        }
    }
}

impl Display for Handle {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

impl Debug for Handle {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{:#010x} ({:?})", self.0, self.kind())
    }
}

/// The result of a dispatcher call.
///
/// `status` is either one of the [`Status`] codes, or a value defined by a service or fast call
/// (e.g. a discovered handle or the interface version).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DispatchResult {
    /// Status code or return value of the call.
    pub status: i32,
    /// Events raised by services since the previous call which blocked.
    pub flags: EventFlags,
}

impl DispatchResult {
    /// Packs the result into the single 64-bit value returned to the non-secure world, with the
    /// status in the low half and the event flags in the high half.
    pub fn to_wire(self) -> u64 {
        (u64::from(self.flags.bits()) << 32) | u64::from(self.status as u32)
    }

    /// Unpacks a value created by [`to_wire`](Self::to_wire).
    pub fn from_wire(value: u64) -> Self {
        Self {
            status: value as u32 as i32,
            flags: EventFlags::from_bits_retain((value >> 32) as u32),
        }
    }

    /// Returns the status as one of the dispatcher status codes, if it is one.
    pub fn status_code(&self) -> Option<Status> {
        Status::try_from(self.status).ok()
    }
}

impl From<Status> for DispatchResult {
    fn from(status: Status) -> Self {
        Self::from(i32::from(status))
    }
}

impl From<i32> for DispatchResult {
    fn from(status: i32) -> Self {
        Self {
            status,
            flags: EventFlags::empty(),
        }
    }
}

impl From<Handle> for DispatchResult {
    fn from(handle: Handle) -> Self {
        Self::from(handle.0 as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_handles() {
        assert_eq!(Handle(0).kind(), HandleKind::Trampoline);
        assert_eq!(Handle(1).kind(), HandleKind::Discovery);
        assert_eq!(Handle(2).kind(), HandleKind::StatusQuery);
        assert_eq!(Handle(3).kind(), HandleKind::Idle);
        assert_eq!(Handle(4).kind(), HandleKind::Version);
        assert_eq!(Handle(5).kind(), HandleKind::Invalid);
        assert_eq!(Handle(SERVICE_HANDLE_BASE - 1).kind(), HandleKind::Invalid);
    }

    #[test]
    fn service_handles() {
        assert_eq!(
            Handle(SERVICE_HANDLE_BASE).kind(),
            HandleKind::Service(ServiceId(0))
        );
        assert_eq!(
            Handle(SERVICE_HANDLE_BASE + 3 * SERVICE_HANDLE_STRIDE).kind(),
            HandleKind::Service(ServiceId(3))
        );
        // Misaligned.
        assert_eq!(Handle(SERVICE_HANDLE_BASE + 1).kind(), HandleKind::Invalid);
        assert_eq!(
            Handle(SERVICE_HANDLE_BASE + SERVICE_HANDLE_STRIDE - 1).kind(),
            HandleKind::Invalid
        );
        // Beyond the largest possible index.
        let past_end = SERVICE_HANDLE_BASE + (u32::from(u16::MAX) + 1) * SERVICE_HANDLE_STRIDE;
        assert_eq!(Handle(past_end).kind(), HandleKind::Invalid);
    }

    #[test]
    fn fast_call_handles() {
        assert_eq!(Handle(0xfa57_0000).kind(), HandleKind::FastCall(0));
        assert_eq!(Handle(0xfa57_0002).kind(), HandleKind::FastCall(2));
        assert_eq!(Handle(0xfa57_ffff).kind(), HandleKind::FastCall(0xffff));
        assert_eq!(Handle(0xfa56_0002).kind(), HandleKind::Invalid);
        assert_eq!(Handle(0xfb57_0002).kind(), HandleKind::Invalid);
    }

    /// Constructing a handle of one kind must never decode as another kind.
    #[test]
    fn handle_partition() {
        for index in 0..=u16::MAX {
            assert_eq!(
                Handle::fast_call(index).kind(),
                HandleKind::FastCall(index)
            );
            assert_eq!(
                Handle::service(ServiceId(index)).kind(),
                HandleKind::Service(ServiceId(index))
            );
        }

        let largest_service = Handle::service(ServiceId(u16::MAX)).0;
        assert!(largest_service < FAST_CALL_TAG);
        assert!(Handle::VERSION.0 < SERVICE_HANDLE_BASE);

        for value in (0..u32::MAX).step_by(0x1_0001) {
            let kind = Handle(value).kind();
            match kind {
                HandleKind::FastCall(index) => assert_eq!(Handle::fast_call(index).0, value),
                HandleKind::Service(id) => assert_eq!(Handle::service(id).0, value),
                HandleKind::Invalid => {}
                _ => assert!(value <= Handle::VERSION.0),
            }
        }
    }

    #[test]
    fn status_codes() {
        assert_eq!(i32::from(Status::Ok), 0);
        assert_eq!(i32::from(Status::Intr), -1);
        assert_eq!(i32::from(Status::NoEnt), -2);
        assert_eq!(i32::from(Status::Invalid), -3);
        assert_eq!(i32::from(Status::BadHandle), -4);
        assert_eq!(i32::from(Status::Exist), -5);
        assert_eq!(i32::from(Status::NoHandles), -6);
        assert_eq!(i32::from(Status::Busy), -7);
        assert_eq!(Status::try_from(-7).ok(), Some(Status::Busy));
        assert!(Status::try_from(1).is_err());
        assert_eq!(Status::BadHandle.to_string(), "BADH");
    }

    #[test]
    fn wire_packing() {
        let result = DispatchResult {
            status: Status::Busy.into(),
            flags: EventFlags::from_bits_retain(0x8000_0001),
        };
        assert_eq!(result.to_wire(), 0x8000_0001_ffff_fff9);
        assert_eq!(DispatchResult::from_wire(result.to_wire()), result);
        assert_eq!(result.status_code(), Some(Status::Busy));

        let version = DispatchResult::from(VERSION);
        assert_eq!(version.to_wire(), 0x0000_0000_0100_0000);
        assert_eq!(version.status_code(), None);
    }
}
