//! Request loading for the loan commands.
//!
//! A command reads its typed request from `--input <file>` first, then from
//! JSON piped on stdin. When neither is present it builds the request from
//! its own flags.

use serde::de::DeserializeOwned;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

type InputResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Load a typed request from `path` or, failing that, piped stdin.
pub fn load<T: DeserializeOwned>(path: Option<&str>) -> InputResult<Option<T>> {
    match path {
        Some(path) => read_file(path).map(Some),
        None => read_stdin(),
    }
}

/// Resolve `path` against the working directory and check it names a file.
pub fn resolve_path(path: &str) -> InputResult<PathBuf> {
    let p = Path::new(path);
    let resolved = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()?.join(p)
    };

    if !resolved.is_file() {
        let problem = if resolved.exists() { "Not a file" } else { "File not found" };
        return Err(format!("{problem}: {}", resolved.display()).into());
    }
    Ok(resolved)
}

fn read_file<T: DeserializeOwned>(path: &str) -> InputResult<T> {
    let resolved = resolve_path(path)?;
    let contents = fs::read_to_string(&resolved)
        .map_err(|e| format!("Failed to read '{}': {}", resolved.display(), e))?;
    let request = serde_json::from_str(&contents)
        .map_err(|e| format!("Invalid request in '{}': {}", resolved.display(), e))?;
    tracing::debug!(path = %resolved.display(), "loaded request file");
    Ok(request)
}

fn read_stdin<T: DeserializeOwned>() -> InputResult<Option<T>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    let trimmed = buffer.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let request = serde_json::from_str(trimmed).map_err(|e| format!("Invalid request on stdin: {e}"))?;
    Ok(Some(request))
}
