use std::env;
use std::error::Error;
use std::path::{Path, PathBuf};

fn main() -> Result<(), Box<dyn Error>> {
    let proto_root = Path::new("proto");
    let proto_path = proto_root.join("accesslog/v1/accesslog.proto");

    println!("cargo:rerun-if-changed={}", proto_path.display());

    // The descriptor set backs the gRPC reflection service.
    let out_dir = PathBuf::from(env::var("OUT_DIR")?);

    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .file_descriptor_set_path(out_dir.join("accesslog_descriptor.bin"))
        .compile_protos(&[proto_path], &[proto_root])?;

    Ok(())
}
