fn main() {
    // `runtime::printd`/`runtime::putchard` are never called from Rust —
    // the JIT resolves them by symbol name at runtime (src/runtime.rs).
    // Without these flags the linker drops them as unreferenced and
    // `inkwell`'s MCJIT crashes calling a null function pointer.
    println!("cargo:rustc-link-arg-bins=-rdynamic");
    println!("cargo:rustc-link-arg-bins=-Wl,-u,printd");
    println!("cargo:rustc-link-arg-bins=-Wl,-u,putchard");
}
