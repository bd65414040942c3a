//! Organ table resolution.
//!
//! Lookup order: explicit path (CLI) → `$OED_ORGAN_TABLE` →
//! `<config dir>/oed/organs.json` → embedded default. The first source
//! found is loaded and validated; later sources are not consulted.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::organs::OrganTable;
use crate::validate::{validate_organ_table, ValidationError};

/// Environment variable naming an organ table file.
pub const ENV_ORGAN_TABLE: &str = "OED_ORGAN_TABLE";

/// File name looked up under the user configuration directory.
pub const USER_TABLE_RELATIVE: &str = "oed/organs.json";

/// Explicit paths supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    pub organ_table: Option<PathBuf>,
}

/// Where the organ table came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableSource {
    Explicit(PathBuf),
    Env(PathBuf),
    UserConfig(PathBuf),
    Embedded,
}

impl std::fmt::Display for TableSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableSource::Explicit(p) => write!(f, "explicit:{}", p.display()),
            TableSource::Env(p) => write!(f, "env:{}", p.display()),
            TableSource::UserConfig(p) => write!(f, "user:{}", p.display()),
            TableSource::Embedded => write!(f, "embedded"),
        }
    }
}

/// A validated organ table plus its provenance.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub organ_table: OrganTable,
    pub source: TableSource,
}

/// Resolve the organ table from the process environment.
pub fn resolve_config(paths: &ConfigPaths) -> Result<ResolvedConfig, ValidationError> {
    let env_path = std::env::var_os(ENV_ORGAN_TABLE)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from);
    let user_dir = dirs::config_dir();
    resolve_with(paths, env_path, user_dir.as_deref())
}

/// Resolution with the environment lookups supplied by the caller.
pub fn resolve_with(
    paths: &ConfigPaths,
    env_path: Option<PathBuf>,
    user_config_dir: Option<&Path>,
) -> Result<ResolvedConfig, ValidationError> {
    let source = if let Some(path) = &paths.organ_table {
        TableSource::Explicit(path.clone())
    } else if let Some(path) = env_path {
        TableSource::Env(path)
    } else {
        match user_config_dir
            .map(|dir| dir.join(USER_TABLE_RELATIVE))
            .filter(|p| p.is_file())
        {
            Some(path) => TableSource::UserConfig(path),
            None => TableSource::Embedded,
        }
    };

    let organ_table = match &source {
        TableSource::Explicit(p) | TableSource::Env(p) | TableSource::UserConfig(p) => {
            OrganTable::from_file(p)?
        }
        TableSource::Embedded => OrganTable::default(),
    };
    validate_organ_table(&organ_table)?;
    debug!(source = %source, organs = organ_table.len(), "organ table resolved");

    Ok(ResolvedConfig {
        organ_table,
        source,
    })
}
