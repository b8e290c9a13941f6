// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! The interface to the secure-world thread scheduler which the dispatcher runs on top of.

use core::{fmt::Debug, time::Duration};

/// A thread scheduling priority. Higher values are more urgent.
#[derive(Copy, Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct Priority(pub u8);

/// Why a suspended thread started running again.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum WakeReason {
    /// Another thread resumed it with the given message.
    Resumed(i32),
    /// The timeout passed to [`Scheduler::suspend`] expired first.
    TimedOut,
}

/// A priority-based preemptive thread scheduler.
///
/// All state shared between the dispatcher and service threads is only modified while holding the
/// scheduler's lock, which prevents any other thread from being scheduled until it is released.
pub trait Scheduler: Sync + 'static {
    /// A reference to a thread.
    type Thread: Copy + Debug + Eq + Send;

    /// Proof that the current thread holds the scheduler lock. The lock is released when this is
    /// dropped.
    type Lock<'a>
    where
        Self: 'a;

    /// The priority of threads which don't need any special treatment.
    const NORMAL_PRIORITY: Priority;

    /// The highest priority a thread can run at.
    const HIGHEST_PRIORITY: Priority;

    /// Acquires the scheduler lock.
    fn lock(&self) -> Self::Lock<'_>;

    /// Returns the currently running thread.
    fn current(&self) -> Self::Thread;

    /// Makes the given suspended thread ready to run, such that its call to
    /// [`suspend`](Self::suspend) returns `WakeReason::Resumed(message)`.
    ///
    /// This doesn't reschedule: the resumed thread can't run until the lock is released.
    fn resume(&self, lock: &mut Self::Lock<'_>, thread: Self::Thread, message: i32);

    /// Suspends the current thread until it is resumed or the timeout expires.
    ///
    /// The lock is released while the thread is suspended and held again when this returns.
    /// `None` means wait forever.
    fn suspend(&self, lock: &mut Self::Lock<'_>, timeout: Option<Duration>) -> WakeReason;

    /// Sets the priority of the current thread, returning the previous priority.
    fn set_priority(&self, priority: Priority) -> Priority;

    /// Creates a new thread at the given priority which runs `entry`.
    fn spawn(
        &self,
        priority: Priority,
        name: &'static str,
        entry: impl FnOnce() + Send + 'static,
    ) -> Self::Thread;
}
