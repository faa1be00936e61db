/// Builds the gRPC client and server code for the `provider.proto` definition
/// using `tonic-prost-build`.
///
/// The file descriptor set is written next to the generated code so the
/// server can advertise the schema through gRPC reflection.
///
/// # Byte Fields
///
/// `File.content` is generated as `Bytes` instead of `Vec<u8>` so attached
/// files in host requests decode without an extra copy.
///
/// # Output
///
/// ```rust,ignore
/// pub mod proto {
///     tonic::include_proto!("provider");
/// }
/// ```
use std::env;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let out_dir = PathBuf::from(env::var("OUT_DIR")?);
    let descriptor_path = out_dir.join("provider_descriptor.bin");

    let mut config = tonic_prost_build::Config::new();
    config
        .bytes([".provider.File.content"])
        .file_descriptor_set_path(&descriptor_path);

    tonic_prost_build::configure().compile_with_config(
        config,
        &["proto/provider.proto"],
        &["proto"],
    )?;

    println!("cargo:rerun-if-changed=proto/provider.proto");
    Ok(())
}
