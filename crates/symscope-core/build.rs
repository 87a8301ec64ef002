//! Build script for symscope-core
//!
//! Checks the toolchain before compilation. The crate relies on
//! `u64::wrapping_add_signed` and `Option::is_some_and`, which need
//! Rust 1.70 or newer.

fn main()
{
    println!("cargo:rerun-if-changed=build.rs");

    let Ok(min_rust_version) = rustc_version::Version::parse("1.70.0") else {
        println!("cargo:warning=could not parse the minimum Rust version");
        return;
    };

    if let Ok(rustc_version) = rustc_version::version() {
        if rustc_version < min_rust_version {
            panic!("symscope-core requires Rust {min_rust_version} or newer, found {rustc_version}");
        }
    } else {
        // If we can't get version (e.g., in some build environments), just warn
        println!("cargo:warning=could not verify Rust version");
    }
}
