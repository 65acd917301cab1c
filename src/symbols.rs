//! Symbol-table lookup for panic traces — an external collaborator
//! (§1 Non-goals): resolving an address to a kernel symbol name needs a
//! parsed `.symtab`/`.strtab`, which this crate does not carry. The
//! panic path calls through here anyway so that plugging in a real
//! resolver later is a one-function change.

/// Resolves `addr` to the nearest preceding kernel symbol, if a symbol
/// table were available. Always `None` here.
pub fn resolve(_addr: u32) -> Option<&'static str> {
    None
}
