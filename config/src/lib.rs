//! Load configuration from XDG `config.toml` and project `.env`, then apply to the process
//! environment with priority: **existing env > .env > XDG**.
//!
//! The XDG file may also carry an `[engine]` table; its keys are exposed as `TRELLIS_*`
//! variables so the engine reads a single source (the environment):
//!
//! ```toml
//! [env]
//! OPENAI_API_KEY = "sk-..."
//!
//! [engine]
//! model = "gpt-4o-mini"
//! max_steps = 200
//! event_buffer = 64
//! ```

mod dotenv_file;
mod xdg_toml;

#[cfg(feature = "tracing-init")]
pub mod tracing_init;

/// Serializes tests that read or write the process environment.
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("xdg config path: {0}")]
    XdgPath(String),
    #[error("read xdg config: {0}")]
    XdgRead(std::io::Error),
    #[error("parse xdg toml: {0}")]
    XdgParse(#[from] toml::de::Error),
    #[error("read .env: {0}")]
    Dotenv(String),
    #[error("log file: {0}")]
    LogFile(String),
}

/// Where an applied variable came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvSource {
    Dotenv,
    XdgEnv,
    XdgEngine,
}

/// One variable that [`load_and_apply`] wrote into the process environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppliedVar {
    pub key: String,
    pub source: EnvSource,
}

/// Loads config from XDG `config.toml` and optional project `.env`, then sets environment
/// variables only for keys that are **not** already set (so existing env has highest priority).
///
/// Order of precedence when a key is missing in the process environment:
/// 1. Value from project `.env` (current directory or `override_dir` if given)
/// 2. Value from `$XDG_CONFIG_HOME/<app_name>/config.toml` `[env]` table
/// 3. Value derived from the same file's `[engine]` table (`TRELLIS_MODEL`, ...)
///
/// Returns the variables that were applied, sorted by key. Values are not returned so
/// callers can log the result without leaking secrets.
pub fn load_and_apply(
    app_name: &str,
    override_dir: Option<&Path>,
) -> Result<Vec<AppliedVar>, LoadError> {
    let xdg = xdg_toml::load(app_name)?;
    let dotenv_map = dotenv_file::load_env_map(override_dir)?;

    let mut candidates: BTreeMap<String, (String, EnvSource)> = BTreeMap::new();
    for (k, v) in xdg.engine_env() {
        candidates.insert(k, (v, EnvSource::XdgEngine));
    }
    for (k, v) in xdg.env {
        candidates.insert(k, (v, EnvSource::XdgEnv));
    }
    for (k, v) in dotenv_map {
        candidates.insert(k, (v, EnvSource::Dotenv));
    }

    let mut applied = Vec::new();
    for (key, (value, source)) in candidates {
        if std::env::var_os(&key).is_some() {
            continue;
        }
        std::env::set_var(&key, value);
        applied.push(AppliedVar { key, source });
    }
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn restore_var(key: &str, prev: Option<String>) {
        match prev {
            Some(v) => env::set_var(key, v),
            None => env::remove_var(key),
        }
    }

    fn write_xdg(app: &str, body: &str) -> tempfile::TempDir {
        let xdg_dir = tempfile::tempdir().unwrap();
        let app_dir = xdg_dir.path().join(app);
        std::fs::create_dir_all(&app_dir).unwrap();
        std::fs::write(app_dir.join("config.toml"), body).unwrap();
        xdg_dir
    }

    #[test]
    fn existing_env_wins() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dotenv_dir = tempfile::tempdir().unwrap();
        std::fs::write(dotenv_dir.path().join(".env"), "TRELLIS_CFG_EXISTING=from_dotenv\n").unwrap();
        env::set_var("TRELLIS_CFG_EXISTING", "from_env");
        let applied = load_and_apply("trellis-cfg-none", Some(dotenv_dir.path())).unwrap();
        assert_eq!(env::var("TRELLIS_CFG_EXISTING").as_deref(), Ok("from_env"));
        assert!(applied.iter().all(|a| a.key != "TRELLIS_CFG_EXISTING"));
        env::remove_var("TRELLIS_CFG_EXISTING");
    }

    #[test]
    fn no_config_applies_nothing() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let empty_dir = tempfile::tempdir().unwrap();
        let applied = load_and_apply("trellis-cfg-nonexistent-app", Some(empty_dir.path())).unwrap();
        assert!(applied.is_empty());
    }

    /// **Scenario**: .env, XDG `[env]` and XDG `[engine]` all name keys; precedence holds and
    /// each applied key reports its source.
    #[test]
    fn layered_sources_respect_precedence() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let xdg_dir = write_xdg(
            "trellis-layered",
            "[env]\nTRELLIS_CFG_PRIORITY = \"from_xdg\"\nTRELLIS_CFG_XDG_ONLY = \"x\"\n\n[engine]\nmax_steps = 42\n",
        );
        let dotenv_dir = tempfile::tempdir().unwrap();
        std::fs::write(dotenv_dir.path().join(".env"), "TRELLIS_CFG_PRIORITY=from_dotenv\n").unwrap();

        let prev_xdg = env::var("XDG_CONFIG_HOME").ok();
        let prev_steps = env::var("TRELLIS_MAX_STEPS").ok();
        env::set_var("XDG_CONFIG_HOME", xdg_dir.path());
        env::remove_var("TRELLIS_CFG_PRIORITY");
        env::remove_var("TRELLIS_CFG_XDG_ONLY");
        env::remove_var("TRELLIS_MAX_STEPS");

        let applied = load_and_apply("trellis-layered", Some(dotenv_dir.path())).unwrap();
        let priority = env::var("TRELLIS_CFG_PRIORITY").unwrap();
        let xdg_only = env::var("TRELLIS_CFG_XDG_ONLY").unwrap();
        let steps = env::var("TRELLIS_MAX_STEPS").unwrap();

        env::remove_var("TRELLIS_CFG_PRIORITY");
        env::remove_var("TRELLIS_CFG_XDG_ONLY");
        restore_var("TRELLIS_MAX_STEPS", prev_steps);
        restore_var("XDG_CONFIG_HOME", prev_xdg);

        assert_eq!(priority, "from_dotenv");
        assert_eq!(xdg_only, "x");
        assert_eq!(steps, "42");
        let source_of = |k: &str| applied.iter().find(|a| a.key == k).map(|a| a.source);
        assert_eq!(source_of("TRELLIS_CFG_PRIORITY"), Some(EnvSource::Dotenv));
        assert_eq!(source_of("TRELLIS_CFG_XDG_ONLY"), Some(EnvSource::XdgEnv));
        assert_eq!(source_of("TRELLIS_MAX_STEPS"), Some(EnvSource::XdgEngine));
    }
}
