use boot_info::memory;
use std::{env, path::PathBuf};

fn main() {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let ld = manifest_dir.join("bootstrap.ld");

    // Fail fast if the layout constants drift somewhere unlinkable.
    let base = memory::BOOTSTRAP_BASE;
    let ceiling = memory::BOOTSTRAP_CEILING;
    let phys_load = memory::KERNEL_PHYS_LOAD;
    assert!(
        base < ceiling && ceiling <= 0x1_0000,
        "bootstrap region must fit below 64 KiB (base {base:#x}, ceiling {ceiling:#x})"
    );
    assert_eq!(
        phys_load & 0xfff,
        0,
        "kernel load address must be 4 KiB aligned (got {phys_load:#x})"
    );

    println!("cargo:rerun-if-changed={}", ld.display());

    // Only the freestanding build links the bootstrap image; host builds
    // (tests) must keep their normal startup files.
    if env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("none") {
        println!("cargo:rustc-link-arg-bins=-T{}", ld.display());
        println!("cargo:rustc-link-arg-bins=--defsym=BOOTSTRAP_BASE={base:#x}");
        println!("cargo:rustc-link-arg-bins=--defsym=BOOTSTRAP_CEILING={ceiling:#x}");
        println!("cargo:rustc-link-arg-bins=--defsym=KERNEL_PHYS_LOAD={phys_load:#x}");
    }
}
