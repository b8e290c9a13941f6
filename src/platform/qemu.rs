// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

use super::Platform;
use crate::{
    logger::{self, LockedWriter},
    memory::NsWindow,
};
use arm_pl011_uart::{PL011Registers, Uart, UniqueMmioPointer};
use core::{ptr::NonNull, time::Duration};

/// Base address of the secure world PL011 UART, aka. UART1.
const UART1_BASE: usize = 0x0904_0000;
const PL011_BASE_ADDRESS: *mut PL011Registers = UART1_BASE as _;

/// Start of the DRAM which is left to the non-secure world.
const NS_DRAM_BASE: usize = 0x4000_0000;
const NS_DRAM_SIZE: usize = 0x4000_0000;

/// The aarch64 'virt' machine of the QEMU emulator.
pub struct Qemu;

impl Platform for Qemu {
    const MAX_TIMEOUT: Duration = Duration::from_millis(10);

    type LogSinkImpl = LockedWriter<Uart<'static>>;

    fn init_logger() {
        // SAFETY: `PL011_BASE_ADDRESS` is the base address of a PL011 device, and nothing else
        // accesses that address range once the non-secure world has been started.
        let uart_pointer =
            unsafe { UniqueMmioPointer::new(NonNull::new(PL011_BASE_ADDRESS).unwrap()) };
        logger::init(LockedWriter::new(Uart::new(uart_pointer)))
            .expect("Failed to initialise logger");
    }

    fn non_secure_window() -> NsWindow {
        // SAFETY: The boot code maps the whole of the non-secure DRAM as non-secure memory, and
        // the secure world doesn't keep anything there.
        unsafe { NsWindow::new(NS_DRAM_BASE..NS_DRAM_BASE + NS_DRAM_SIZE) }
    }
}
