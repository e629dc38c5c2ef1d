// Keep the bridge's #[no_mangle] exports in the Windows DLL
use std::env;

fn main() {
    if env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("windows") {
        let target = env::var("TARGET").unwrap_or_default();

        // MSVC exports #[no_mangle] items from a cdylib on its own
        if target.contains("gnu") {
            println!("cargo:rustc-cdylib-link-arg=-Wl,--export-all-symbols");
        }
    }

    println!("cargo:rerun-if-changed=build.rs");
}
