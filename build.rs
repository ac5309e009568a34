//! Build script for the virtual COM port firmware
//!
//! Handles:
//! - Linker scripts for the embedded target (cortex-m-rt and defmt)
//!
//! Host builds (no `embedded` feature) need nothing from here.

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    if std::env::var_os("CARGO_FEATURE_EMBEDDED").is_none() {
        return;
    }

    // memory.x comes from embassy-stm32's `memory-x` feature
    println!("cargo:rustc-link-arg-bins=--nmagic");
    println!("cargo:rustc-link-arg-bins=-Tlink.x");
    println!("cargo:rustc-link-arg-bins=-Tdefmt.x");
}
