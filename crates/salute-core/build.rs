/// Builds the gRPC client and server code for the `helloworld.proto`
/// definition using `tonic-prost-build`.
///
/// The Protocol Buffer definitions in the `proto` directory are compiled into
/// Rust modules in the crate's `OUT_DIR`. A file descriptor set is written
/// next to them so the server can expose gRPC reflection.
///
/// # Files and Paths
///
/// - Proto file: `proto/helloworld.proto`
/// - Includes: `proto/`
/// - Descriptor: `$OUT_DIR/helloworld_descriptor.bin`
///
/// # Panics
///
/// Panics if code generation fails, which aborts the build with protoc's
/// diagnostics.
///
/// # Output
///
/// Generated code is accessible via:
///
/// ```rust
/// pub mod proto {
///     tonic::include_proto!("helloworld");
/// }
/// ```
use std::env;
use std::path::PathBuf;
fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let descriptor_path = out_dir.join("helloworld_descriptor.bin");

    let mut config = tonic_prost_build::Config::new();
    config.file_descriptor_set_path(&descriptor_path);

    println!("cargo:rerun-if-changed=proto/helloworld.proto");

    tonic_prost_build::configure()
        .compile_with_config(config, &["proto/helloworld.proto"], &["proto"])
        .unwrap();
}
