use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("asset {name} not found under {dir}")]
    Missing { name: String, dir: PathBuf },
    #[error("failed to read label file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("label file {path} contains no labels")]
    EmptyLabels { path: PathBuf },
}

/// Resolves a bundled asset by name. Models and label files ship with
/// the application bundle; nothing is downloaded or cached.
pub fn resolve(assets_dir: &Path, name: &str) -> Result<PathBuf, AssetError> {
    let path = assets_dir.join(name);
    if path.exists() {
        Ok(path)
    } else {
        Err(AssetError::Missing {
            name: name.to_string(),
            dir: assets_dir.to_path_buf(),
        })
    }
}

/// Loads an ordered label list, one label per line (line index = class id).
pub fn load_labels(path: &Path) -> Result<Vec<String>, AssetError> {
    let contents = fs::read_to_string(path).map_err(|source| AssetError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let labels: Vec<String> = contents
        .lines()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();

    if labels.is_empty() {
        return Err(AssetError::EmptyLabels {
            path: path.to_path_buf(),
        });
    }
    Ok(labels)
}
