//! Kernel binary entry point.
//!
//! `_start` is generated by [`ferrox_kernel::define_entry`] rather than
//! written out here: every `tests/*.rs` integration test binary needs
//! the identical boot trampoline, and a copy of it compiled into the
//! library itself would collide with each test's own copy at link time
//! (every binary linking this crate provides exactly one `_start`).
//! This binary is the one place the macro is expanded against the real
//! boot sequence, [`ferrox_kernel::bootstrap::early_entry`]; `tests/`
//! expands it against a test-specific entry point instead.

#![no_std]
#![no_main]

use core::panic::PanicInfo;

extern crate ferrox_kernel;

ferrox_kernel::define_entry!(16 * 1024, ferrox_kernel::bootstrap::early_entry);

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    ferrox_kernel::panic::handle(info)
}
