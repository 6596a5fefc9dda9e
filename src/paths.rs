use anyhow::Context;
use std::env;
use std::path::PathBuf;

fn home_dir() -> anyhow::Result<PathBuf> {
    // On Unix, HOME is standard. (Windows support can be expanded later.)
    let home = env::var_os("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home))
}

/// `$CODEX_HOME`, or `~/.codex`.
pub fn codex_home() -> anyhow::Result<PathBuf> {
    if let Some(base) = env::var_os("CODEX_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(base));
    }
    Ok(home_dir()?.join(".codex"))
}

pub fn default_credentials_path() -> anyhow::Result<PathBuf> {
    Ok(codex_home()?.join("auth.json"))
}
