use chrono::Utc;
use std::env;
use std::fs;
use std::path::Path;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=Cargo.toml");

    let out_dir = env::var_os("OUT_DIR").unwrap();
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap();
    let manifest = fs::read_to_string(Path::new(&manifest_dir).join("Cargo.toml")).unwrap();

    // [package.metadata] engine_api_version
    let engine_api_version = manifest
        .parse::<toml::Table>()
        .ok()
        .and_then(|table| {
            table
                .get("package")?
                .get("metadata")?
                .get("engine_api_version")?
                .as_integer()
        })
        .map(|v| v.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let build_time = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");

    let generated = format!(
        "pub const ENGINE_API_VERSION: &str = \"{engine_api_version}\";\n\
         pub const BUILD_TIME: &str = \"{build_time}\";\n"
    );
    fs::write(Path::new(&out_dir).join("version.rs"), generated).unwrap();
}
