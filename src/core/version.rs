//! Build metadata generated by build.rs

include!(concat!(env!("OUT_DIR"), "/version.rs"));

/// Engine API version from the package metadata, with a stable fallback
pub fn api_version() -> u32 {
    ENGINE_API_VERSION.parse().unwrap_or(20250727)
}

pub fn build_time() -> &'static str {
    BUILD_TIME
}

/// One-line version banner used by `--version` and the startup log
pub fn long_version() -> String {
    format!(
        "{} (api {}, built {})",
        env!("CARGO_PKG_VERSION"),
        api_version(),
        build_time()
    )
}
