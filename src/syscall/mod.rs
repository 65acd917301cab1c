//! Syscall dispatcher (§4.10): the one handler registered against
//! [`crate::irq::SYSCALL_VECTOR`] (`int 0x80`), and the table of syscall
//! numbers it switches on.
//!
//! The ABI (§6): `eax` holds the syscall number on entry and the return
//! value (or negative errno) on return; arguments follow in `ebx`,
//! `ecx`, `edx`, `esi`, `edi`, `ebp`, in that order — exactly the
//! registers [`crate::irq::Registers`] already exposes. `open`, `lseek`,
//! and the `stat` family depend on the VFS, which is out of scope here
//! (§1 Non-goals): their numbers are wired up and argument-checked, but
//! the dispatcher answers [`Error::NotImplemented`] rather than pretend
//! to resolve a path. The three standard descriptors (stdin/stdout/
//! stderr) are handled directly against the console device named in §6,
//! with no filesystem underneath them.

use crate::arch::x86::mmu;
use crate::config::PAGE_SIZE;
use crate::error::Error;
use crate::irq::Registers;
use crate::process::ProcessId;

pub const SYS_EXIT: u32 = 1;
pub const SYS_FORK: u32 = 2;
pub const SYS_READ: u32 = 3;
pub const SYS_WRITE: u32 = 4;
pub const SYS_OPEN: u32 = 5;
pub const SYS_CLOSE: u32 = 6;
pub const SYS_WAITPID: u32 = 7;
pub const SYS_EXECVE: u32 = 11;
pub const SYS_LSEEK: u32 = 19;
pub const SYS_GETPID: u32 = 20;
pub const SYS_KILL: u32 = 37;
pub const SYS_BRK: u32 = 45;
pub const SYS_STAT: u32 = 106;
pub const SYS_LSTAT: u32 = 107;
pub const SYS_FSTAT: u32 = 108;
pub const SYS_SBRK: u32 = 463;

struct SyscallArgs {
    a0: u32,
    a1: u32,
    a2: u32,
}

/// Registers the dispatcher against vector 0x80. Part of the `normal`
/// initcall stage.
pub fn init() {
    crate::irq::set_handler(crate::irq::SYSCALL_VECTOR, syscall_entry, core::ptr::null_mut());
}

extern "C" fn syscall_entry(_vector: u8, _error_code: u32, regs: &mut Registers, _data: *mut u8) {
    let number = regs.eax();
    let args = SyscallArgs { a0: regs.ebx(), a1: regs.ecx(), a2: regs.edx() };

    if number == SYS_EXIT {
        // SAFETY(diverges): `exit_current` never returns; the interrupt
        // frame this syscall trapped through is abandoned along with the
        // rest of the exiting thread's kernel stack.
        crate::process::exit_current(args.a0 as i32);
    }

    if number == SYS_FORK {
        let value = sys_fork(regs).unwrap_or_else(|e| e.to_errno() as i32);
        regs.set_return_value(value);
        return;
    }

    let result = match number {
        SYS_READ => sys_read(&args),
        SYS_WRITE => sys_write(&args),
        SYS_OPEN => Err(Error::NotImplemented),
        SYS_CLOSE => sys_close(&args),
        SYS_WAITPID => sys_waitpid(&args),
        SYS_EXECVE => sys_execve(&args),
        SYS_LSEEK => Err(Error::NotImplemented),
        SYS_GETPID => Ok(current_pid_or_kernel()),
        SYS_KILL => sys_kill(&args),
        SYS_BRK => sys_brk(&args),
        SYS_STAT | SYS_LSTAT | SYS_FSTAT => Err(Error::NotImplemented),
        SYS_SBRK => sys_sbrk(&args),
        _ => {
            log::warn!("syscall: unimplemented number {}", number);
            Err(Error::NotImplemented)
        }
    };

    regs.set_return_value(result.unwrap_or_else(|e| e.to_errno() as i32));
}

/// Confirms every page of `[ptr, ptr + len)` is mapped before the
/// dispatcher lets a handler read or write through a raw user pointer.
/// Does not check read/write/user permission bits — a minimal
/// reachability check, not a full access-rights audit.
fn validate_user_buffer(ptr: u32, len: usize) -> Result<(), Error> {
    if len == 0 {
        return Ok(());
    }
    if ptr == 0 {
        return Err(Error::Inval);
    }
    let end = ptr.checked_add(len as u32).ok_or(Error::Inval)?;
    let mut page = ptr & !0xfff;
    while page < end {
        if !mmu::is_mapped(page) {
            return Err(Error::Inval);
        }
        page += PAGE_SIZE as u32;
    }
    Ok(())
}

fn current_pid_or_kernel() -> i32 {
    crate::process::current_process_id().map(|p| p.0 as i32).unwrap_or(0)
}

fn sys_fork(regs: &Registers) -> Result<i32, Error> {
    let tid = crate::sched::current_thread_id();
    let child = crate::process::fork(tid, regs.eip(), regs.stack_pointer())?;
    Ok(child.0 as i32)
}

fn sys_write(args: &SyscallArgs) -> Result<i32, Error> {
    let (fd, buf, len) = (args.a0, args.a1, args.a2 as usize);
    if fd != 1 && fd != 2 {
        return Err(Error::BadFd);
    }
    validate_user_buffer(buf, len)?;
    // SAFETY: `validate_user_buffer` confirmed every page in this range
    // is mapped; the syscall ABI leaves ownership of user memory with
    // the calling thread for the duration of the trap.
    let bytes = unsafe { core::slice::from_raw_parts(buf as *const u8, len) };
    crate::arch::x86::serial::write_bytes(bytes);
    if fd == 1 {
        if let Ok(s) = core::str::from_utf8(bytes) {
            crate::print!("{}", s);
        }
    }
    Ok(len as i32)
}

fn sys_read(args: &SyscallArgs) -> Result<i32, Error> {
    if args.a0 > 2 {
        return Err(Error::BadFd);
    }
    // No input device is wired up yet (§1: only the device framework's
    // UART *write* path is exercised).
    Err(Error::NotImplemented)
}

fn sys_close(args: &SyscallArgs) -> Result<i32, Error> {
    match args.a0 {
        0..=2 => Ok(0),
        _ => Err(Error::BadFd),
    }
}

fn sys_waitpid(args: &SyscallArgs) -> Result<i32, Error> {
    let target = if args.a0 == u32::MAX { None } else { Some(ProcessId(args.a0)) };
    let tid = crate::sched::current_thread_id();
    let (pid, status) = crate::process::waitpid(tid, target)?;
    if args.a1 != 0 {
        validate_user_buffer(args.a1, core::mem::size_of::<i32>())?;
        // SAFETY: validated above.
        unsafe {
            (args.a1 as *mut i32).write(status);
        }
    }
    Ok(pid.0 as i32)
}

/// `execve`'s ABI surface: validates the path pointer and reports
/// `NotImplemented`, since actually loading an ELF image is the loader's
/// job (§6 collaborator, out of scope here).
fn sys_execve(args: &SyscallArgs) -> Result<i32, Error> {
    validate_user_buffer(args.a0, 1)?;
    Err(Error::NotImplemented)
}

fn sys_kill(args: &SyscallArgs) -> Result<i32, Error> {
    crate::process::kill(ProcessId(args.a0))?;
    Ok(0)
}

fn sys_brk(args: &SyscallArgs) -> Result<i32, Error> {
    let pid = crate::process::current_process_id().ok_or(Error::Perm)?;
    let target = if args.a0 == 0 { None } else { Some(args.a0) };
    crate::process::brk(pid, target).map(|v| v as i32)
}

fn sys_sbrk(args: &SyscallArgs) -> Result<i32, Error> {
    let pid = crate::process::current_process_id().ok_or(Error::Perm)?;
    let current = crate::process::brk(pid, None)?;
    let increment = args.a0 as i32;
    let target = (current as i32).checked_add(increment).ok_or(Error::Inval)? as u32;
    crate::process::brk(pid, Some(target))?;
    Ok(current as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn null_pointer_never_validates() {
        assert_eq!(validate_user_buffer(0, 1), Err(Error::Inval));
    }

    #[test_case]
    fn zero_length_buffer_always_validates() {
        assert_eq!(validate_user_buffer(0, 0), Ok(()));
    }
}
