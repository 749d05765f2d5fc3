pub mod build;
pub mod init;
pub mod serve;
pub mod version;

use miette::Result;
use outeria_core::{Config, ProjectConfig};

/// Load `outeria.json` from the working directory.
pub fn load_project(config: &Config) -> Result<ProjectConfig> {
    ProjectConfig::load(&config.cwd)
        .map_err(|e| miette::miette!(code = "CONFIG_INVALID", "{}", e))
}
