//! Architecture boundary. Every other module reaches hardware only
//! through here — `i686` is the only target this crate builds for, but
//! nothing outside this module is allowed to assume that.

#[cfg(target_arch = "x86")]
pub mod x86;
