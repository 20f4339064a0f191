//! Home directory resolution.

use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum HomeDirError {
    #[error("cannot determine the user's home directory")]
    NoHome,

    #[error("cannot determine the current directory: {0}")]
    CurrentDir(#[source] std::io::Error),

    #[error("failed to create home directory {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Platform user directory: `%APPDATA%` on Windows, `$HOME` elsewhere.
fn platform_home() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    let var = "APPDATA";
    #[cfg(not(target_os = "windows"))]
    let var = "HOME";

    std::env::var_os(var)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Expand a leading `~` and make the path absolute.
fn expand(raw: &str) -> Result<PathBuf, HomeDirError> {
    let path = if raw == "~" {
        platform_home().ok_or(HomeDirError::NoHome)?
    } else if let Some(rest) = raw.strip_prefix("~/").or_else(|| raw.strip_prefix("~\\")) {
        platform_home().ok_or(HomeDirError::NoHome)?.join(rest)
    } else {
        PathBuf::from(raw)
    };

    if path.is_absolute() {
        Ok(path)
    } else {
        let cwd = std::env::current_dir().map_err(HomeDirError::CurrentDir)?;
        Ok(cwd.join(path))
    }
}

/// Resolve the server home directory.
///
/// `configured` wins when given (with `~` expansion); otherwise the result is
/// `<platform home>/<default_subdir>`. With `create` the directory is created.
pub fn resolve_home_dir(
    configured: Option<String>,
    default_subdir: &str,
    create: bool,
) -> Result<PathBuf, HomeDirError> {
    let dir = match configured {
        Some(raw) => expand(raw.trim())?,
        None => platform_home()
            .ok_or(HomeDirError::NoHome)?
            .join(default_subdir),
    };

    if create {
        ensure_dir(&dir)?;
    }
    Ok(dir)
}

fn ensure_dir(dir: &Path) -> Result<(), HomeDirError> {
    std::fs::create_dir_all(dir).map_err(|source| HomeDirError::Create {
        path: dir.to_path_buf(),
        source,
    })
}
