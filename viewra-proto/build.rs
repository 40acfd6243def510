fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Generated into OUT_DIR rather than committed under src/ — this crate
    // has a single small protocol, so regenerating on every build is cheap
    // and avoids drift between the checked-in .proto and stale generated code.
    tonic_prost_build::configure()
        .build_server(true)
        .build_client(true)
        .type_attribute(".", "#[derive(serde::Serialize, serde::Deserialize)]")
        .compile_protos(&["proto/transcode.proto"], &["proto"])?;

    println!("cargo:rerun-if-changed=proto/transcode.proto");

    Ok(())
}
