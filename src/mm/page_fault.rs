//! Page-fault exception entry point (§4.2 exception policy, §4.5 fault
//! handler). [`crate::irq::dispatch`] redirects vector 14 here before it
//! ever reaches the generic handler table.

use crate::irq::Registers;
use crate::mm::vas;

const ERROR_PRESENT: u32 = 1 << 0;
const ERROR_WRITE: u32 = 1 << 1;
const ERROR_USER: u32 = 1 << 2;

/// Routes a page fault to the faulting thread's address-space fault
/// handler. A miss there is a genuine access violation: if the CPU was
/// at CPL 3, the offending process is terminated; a kernel-mode miss is
/// an unrecoverable bug and panics with the faulting address and EIP
/// resolved against the nearest kernel symbol.
pub fn handle(faulting_addr: u32, error_code: u32, regs: &mut Registers) {
    let from_user = error_code & ERROR_USER != 0;

    let result = crate::process::with_current_address_space(|space| space.fault(faulting_addr))
        .unwrap_or_else(|| vas::with_kernel_space(|kernel| kernel.fault(faulting_addr)));

    if result.is_ok() {
        return;
    }

    if from_user {
        log::warn!(
            "segfault: pid={:?} addr={:#x} write={} eip={:#x}",
            crate::process::current_process_id(),
            faulting_addr,
            error_code & ERROR_WRITE != 0,
            regs.eip(),
        );
        crate::process::terminate_current_on_fault(faulting_addr);
        return;
    }

    panic!(
        "unhandled kernel page fault: addr={:#x} present={} write={} eip={:#x}",
        faulting_addr,
        error_code & ERROR_PRESENT != 0,
        error_code & ERROR_WRITE != 0,
        regs.eip(),
    );
}
