//! ---
//! refdata_section: "01-core-functionality"
//! refdata_subsection: "build"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "Shared primitives and utilities for the service runtime."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
use vergen::EmitBuilder;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Source tarballs carry no git metadata; vergen falls back to idempotent values.
    EmitBuilder::builder()
        .build_timestamp()
        .all_cargo()
        .git_sha(true)
        .emit()?;

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=REFDATA_GIT_OVERRIDE");
    Ok(())
}
