//! COM1 UART (16550), 38,400 bps 8N1. Out-of-scope as a driver subsystem
//! (§1) but named as an external interface in §6 and exercised directly
//! by the logger and the write-syscall scenario in §8.

use spin::Mutex;
use uart_16550::SerialPort;

const COM1_BASE: u16 = 0x3f8;

lazy_static::lazy_static! {
    static ref COM1: Mutex<SerialPort> = {
        let mut port = unsafe { SerialPort::new(COM1_BASE) };
        port.init();
        Mutex::new(port)
    };
}

pub fn init() {
    COM1.lock().init();
}

pub fn write_bytes(bytes: &[u8]) {
    let mut port = COM1.lock();
    for &b in bytes {
        port.send(b);
    }
}

#[doc(hidden)]
pub fn _print(args: core::fmt::Arguments) {
    use core::fmt::Write;
    COM1.lock().write_fmt(args).ok();
}
