// Regenerates include/pcmstream.h with `cbindgen` when it is installed and
// always places a copy in $OUT_DIR. Without cbindgen the checked-in header
// is used as is.

use std::{env, fs, path::PathBuf, process::Command};

fn main() {
    println!("cargo:rerun-if-changed=src/lib.rs");
    println!("cargo:rerun-if-changed=include/pcmstream.h");

    let crate_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR is set by cargo"));
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));
    let checked_in = crate_dir.join("include").join("pcmstream.h");
    let generated = out_dir.join("pcmstream.h");

    let generated_ok = Command::new("cbindgen")
        .args(["--crate", "pcmstream-ffi", "--lang", "C", "--cpp-compat", "--output"])
        .arg(&generated)
        .current_dir(&crate_dir)
        .status()
        .map(|s| s.success())
        .unwrap_or(false);

    if generated_ok {
        let _ = fs::copy(&generated, &checked_in);
        return;
    }
    println!("cargo:warning=pcmstream-ffi: cbindgen unavailable, using include/pcmstream.h");
    fs::copy(&checked_in, &generated).expect("include/pcmstream.h is checked in");
}
