use anyhow::Context;
use std::path::Path;

/// Writes `contents` to `path`, or prints it to stdout when no path is given.
pub async fn emit(path: Option<&Path>, contents: &str) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("create output dir {}", parent.display()))?;
            }
            tokio::fs::write(path, contents)
                .await
                .with_context(|| format!("write output {}", path.display()))?;
            tracing::info!(path = %path.display(), bytes = contents.len(), "output written");
            eprintln!("saved to {}", path.display());
        }
        None => println!("{contents}"),
    }
    Ok(())
}

pub async fn read_input(path: &Path) -> anyhow::Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("read input {}", path.display()))
}
