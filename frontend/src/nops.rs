//! Recognition of x86 padding sequences.

use crate::GuestMemory;

/// Whether `code` consists entirely of no-op encodings.
///
/// Covers `nop`, the `0x66` operand-size prefix, the `0f 1f` multi-byte
/// forms and the `lea esi,[esi+0]` idioms compilers pad with. Matching
/// is greedy and exact: a trailing fragment of any encoding fails the
/// whole query.
pub fn is_nops(code: &[u8]) -> bool {
    match code {
        [] => true,
        [0x90, rest @ ..] => is_nops(rest),
        // A 0x66 prefix followed by more bytes can still be a nop.
        [0x66, rest @ ..] if !rest.is_empty() => is_nops(rest),
        [0x0f, 0x1f, 0x00, rest @ ..] => is_nops(rest),
        // lea esi,[esi+0]
        [0x8d, 0x76, 0x00, rest @ ..] => is_nops(rest),
        [0x0f, 0x1f, 0x40, 0x00, rest @ ..] => is_nops(rest),
        [0x8d, 0x74, 0x26, 0x00, rest @ ..] => is_nops(rest),
        [0x0f, 0x1f, 0x44, 0x00, 0x00, rest @ ..] => is_nops(rest),
        [0x8d, 0xb6, 0x00, 0x00, 0x00, 0x00, rest @ ..] => is_nops(rest),
        [0x0f, 0x1f, 0x80, 0x00, 0x00, 0x00, 0x00, rest @ ..] => is_nops(rest),
        // lea esi,[esi+eiz*1+0]
        [0x8d, 0xb4, 0x26, 0x00, 0x00, 0x00, 0x00, rest @ ..] => is_nops(rest),
        [0x0f, 0x1f, 0x84, 0x00, 0x00, 0x00, 0x00, 0x00, rest @ ..] => is_nops(rest),
        _ => false,
    }
}

/// [`is_nops`] over `n` guest bytes at `addr`.
///
/// Never reads past `n` bytes; fails if fewer are mapped.
pub fn is_nops_at(mem: &dyn GuestMemory, addr: u64, n: usize) -> bool {
    let bytes = mem.fetch(addr, n);
    bytes.len() == n && is_nops(bytes)
}
