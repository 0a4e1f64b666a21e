//! Configuration scaffolding for `llm-modules init`.
//!
//! Writes the repository template into `~/.llm-modules/` without overwriting an existing
//! local file.

use anyhow::Result;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.toml";
const CONFIG_TEMPLATE: &str = include_str!("../../config-templates/config.toml");

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    Created(PathBuf),
    AlreadyPresent(PathBuf),
}

pub async fn initialize_default() -> Result<InitOutcome> {
    initialize_at_root(&crate::config::config_root()).await
}

pub async fn initialize_at_root(root: &Path) -> Result<InitOutcome> {
    tokio::fs::create_dir_all(root)
        .await
        .map_err(|e| anyhow::anyhow!("create config root {}: {e}", root.display()))?;

    let target = root.join(CONFIG_FILE);
    match tokio::fs::metadata(&target).await {
        Ok(_) => Ok(InitOutcome::AlreadyPresent(target)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tokio::fs::write(&target, CONFIG_TEMPLATE)
                .await
                .map_err(|e| anyhow::anyhow!("write config template {}: {e}", target.display()))?;
            tracing::info!(path = %target.display(), "config template written");
            Ok(InitOutcome::Created(target))
        }
        Err(err) => Err(anyhow::anyhow!(
            "inspect config path {}: {err}",
            target.display()
        )),
    }
}
