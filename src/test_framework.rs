//! No-std test framework for the kernel.
//!
//! Compiled unconditionally (not gated on `cfg(test)`) because the
//! integration test binaries under `tests/` depend on this library
//! built the ordinary way, not the `--cfg test` build cargo reserves
//! for the lib's own unit-test harness.
//!
//! Bare-metal tests run inside QEMU with no host to report results to,
//! so pass/fail is communicated by writing a status code to the
//! `isa-debug-exit` device at port `0xf4` (the `qemu_debug` feature
//! wires the device into the QEMU invocation the test harness uses) and
//! letting QEMU's own exit code carry the result back to the runner.

use core::panic::PanicInfo;

use crate::{serial_print, serial_println};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum QemuExitCode {
    Success = 0x10,
    Failed = 0x11,
}

pub trait Testable {
    fn run(&self);
}

impl<T> Testable for T
where
    T: Fn(),
{
    fn run(&self) {
        serial_print!("{}...\t", core::any::type_name::<T>());
        self();
        serial_println!("[ok]");
    }
}

pub fn test_runner(tests: &[&dyn Testable]) {
    serial_println!("running {} tests", tests.len());
    for test in tests {
        test.run();
    }
    exit_qemu(QemuExitCode::Success);
}

pub fn test_panic_handler(info: &PanicInfo) -> ! {
    serial_println!("[failed]\n");
    serial_println!("error: {}\n", info);
    exit_qemu(QemuExitCode::Failed);
}

/// Writes `exit_code` to the `isa-debug-exit` device and never returns:
/// QEMU tears the machine down before the instruction after the port
/// write would execute.
pub fn exit_qemu(exit_code: QemuExitCode) -> ! {
    // SAFETY: port 0xf4 is only meaningful under the `isa-debug-exit`
    // device QEMU is started with for test runs; writing to it outside
    // that context is a no-op on real hardware, never a correctness
    // hazard for the kernel itself.
    unsafe {
        crate::arch::x86::port::outl(0xf4, exit_code as u32);
    }
    loop {
        crate::arch::x86::port::halt();
    }
}
