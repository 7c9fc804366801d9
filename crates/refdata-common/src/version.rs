//! ---
//! refdata_section: "01-core-functionality"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "Build metadata surfaced through the CLI and health endpoint."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
use serde::Serialize;

const UNKNOWN: &str = "UNKNOWN";

/// Compile-time version metadata captured via `vergen`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub version: String,
    pub git_sha: String,
    pub build_timestamp: String,
    pub profile: String,
}

impl VersionInfo {
    #[must_use]
    pub fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_owned(),
            git_sha: option_env!("VERGEN_GIT_SHA").unwrap_or(UNKNOWN).to_owned(),
            build_timestamp: option_env!("VERGEN_BUILD_TIMESTAMP")
                .unwrap_or(UNKNOWN)
                .to_owned(),
            profile: option_env!("VERGEN_CARGO_PROFILE")
                .unwrap_or(UNKNOWN)
                .to_owned(),
        }
    }

    /// One line banner used when the daemon starts.
    #[must_use]
    pub fn banner(&self) -> String {
        format!("refdata v{} (git {})", self.version, self.git_sha)
    }

    /// Multi-line string for `--version`.
    #[must_use]
    pub fn extended(&self) -> String {
        format!(
            "{}\nBuilt: {}\nProfile: {}",
            self.banner(),
            self.build_timestamp,
            self.profile
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn banner_contains_package_version() {
        let info = VersionInfo::current();
        assert!(info.banner().contains(env!("CARGO_PKG_VERSION")));
        assert!(info.extended().starts_with(&info.banner()));
    }
}
