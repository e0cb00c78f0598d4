use crate::error::{Result, RewriteError};
use serde::{Deserialize, Serialize};

/// Flags forwarded to the external rewriter plus local file-naming policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriteConfig {
    /// Copy non-class resources from the input archive unchanged
    pub pass_through_resources: bool,

    /// Rename locals whose names are not valid identifiers
    pub rename_invalid_locals: bool,

    /// Regenerate `SourceFile` attributes from the mapped class names
    pub rebuild_source_filenames: bool,

    /// Suffix for the archive moved aside by in-place rewrites (`mod.jar` -> `mod-dev.jar`)
    pub dev_suffix: String,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            pass_through_resources: true,
            rename_invalid_locals: false,
            rebuild_source_filenames: false,
            dev_suffix: "-dev".to_string(),
        }
    }
}

impl RewriteConfig {
    /// Deobfuscating a vendor archive: obfuscated locals and source names need repair
    pub fn for_game_archive() -> Self {
        Self {
            rename_invalid_locals: true,
            rebuild_source_filenames: true,
            ..Default::default()
        }
    }

    /// Reobfuscating a project archive built from readable sources
    pub fn for_project_archive() -> Self {
        Self::default()
    }

    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.dev_suffix.is_empty() {
            return Err(RewriteError::Config("dev_suffix must not be empty".to_string()));
        }
        if self.dev_suffix.contains(['/', '\\']) {
            return Err(RewriteError::Config(format!(
                "dev_suffix `{}` must not contain path separators",
                self.dev_suffix
            )));
        }
        Ok(())
    }
}
