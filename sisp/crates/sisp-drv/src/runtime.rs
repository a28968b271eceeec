//! Host-process functions the JIT resolves by symbol name (grounded on
//! `putchard`/`printd` in `examples/original_source/sisp/sisp09.cpp`):
//! declaring `extern putchard(x: float) -> float;` or
//! `extern printd(x: float) -> float;` and calling it from JIT-evaluated
//! source reaches these definitions, since `inkwell`'s MCJIT resolves
//! unbound external symbols against the running process's own symbol
//! table. `#[no_mangle]` keeps the symbol name intact for that lookup.

use std::io::Write;

#[no_mangle]
pub extern "C" fn putchard(x: f64) {
    print!("{}", x as u8 as char);
    let _ = std::io::stdout().flush();
}

#[no_mangle]
pub extern "C" fn printd(x: f64) {
    print!("{x:.6}");
    let _ = std::io::stdout().flush();
}
