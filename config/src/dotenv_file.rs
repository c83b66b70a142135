//! Read the project `.env` into a key-value map (applying happens in lib).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::LoadError;

fn dotenv_path(override_dir: Option<&Path>) -> Option<PathBuf> {
    let dir = override_dir
        .map(Path::to_path_buf)
        .or_else(|| std::env::current_dir().ok())?;
    let path = dir.join(".env");
    path.is_file().then_some(path)
}

/// Loads `.env` from `override_dir` or the current directory. Missing file returns an empty map.
///
/// Parsing is delegated to the `dotenv` crate's iterator so nothing is written to the
/// process environment here.
pub fn load_env_map(override_dir: Option<&Path>) -> Result<HashMap<String, String>, LoadError> {
    let Some(path) = dotenv_path(override_dir) else {
        return Ok(HashMap::new());
    };
    let iter = dotenv::from_path_iter(&path).map_err(|e| LoadError::Dotenv(e.to_string()))?;
    let mut out = HashMap::new();
    for item in iter {
        let (key, value) = item.map_err(|e| LoadError::Dotenv(e.to_string()))?;
        out.insert(key, value);
    }
    Ok(out)
}
