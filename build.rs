//! Build script for proto compilation.
//!
//! Compiles `proto/provider.proto` into the crate's `OUT_DIR`. The `protoc`
//! binary comes from `protoc-bin-vendored`, so no system install is needed.
//! An explicit `PROTOC` in the environment takes precedence.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var_os("PROTOC").is_none() {
        let protoc = protoc_bin_vendored::protoc_bin_path()?;
        std::env::set_var("PROTOC", protoc);
    }

    tonic_prost_build::configure()
        .build_client(false)
        .compile_protos(&["proto/provider.proto"], &["proto"])?;

    println!("cargo:rerun-if-changed=proto/provider.proto");

    Ok(())
}
