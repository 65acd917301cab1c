//! PIT channel 0, programmed as the scheduler's 1 kHz preemption tick.

use crate::arch::x86::port::outb;
use crate::config::PIT_BASE_FREQUENCY;
use crate::error::{Error, KResult};

const CHANNEL0_DATA: u16 = 0x40;
const COMMAND: u16 = 0x43;
const MODE3_CHANNEL0_BINARY: u8 = 0b0011_0110;

/// Programs channel 0 for square-wave output at `hz`, the contract
/// §8 boundary behaviour names explicitly: 0 is rejected, and a request
/// above the oscillator's own 1,193,182 Hz is clamped to it instead of
/// silently wrapping the 16-bit divisor.
pub fn set_frequency(hz: u32) -> KResult<()> {
    if hz == 0 {
        return Err(Error::Inval);
    }
    let hz = hz.min(PIT_BASE_FREQUENCY);
    let divisor = (PIT_BASE_FREQUENCY / hz).clamp(1, 0xffff) as u16;

    // SAFETY: 0x43/0x40 are the documented PIT command/channel-0 ports;
    // this is the standard mode-3 programming sequence (command, then
    // low byte, then high byte of the divisor).
    unsafe {
        outb(COMMAND, MODE3_CHANNEL0_BINARY);
        outb(CHANNEL0_DATA, (divisor & 0xff) as u8);
        outb(CHANNEL0_DATA, (divisor >> 8) as u8);
    }
    Ok(())
}

/// The frequency channel 0 actually ends up running at for a given
/// requested `hz`, accounting for integer-divisor rounding. Used by the
/// boot-time self-check in §8's scenario 1 ("reading the PIT frequency
/// returns 1000 +/- 1").
pub fn effective_frequency(hz: u32) -> u32 {
    let hz = hz.clamp(1, PIT_BASE_FREQUENCY);
    let divisor = (PIT_BASE_FREQUENCY / hz).clamp(1, 0xffff);
    PIT_BASE_FREQUENCY / divisor
}
