use std::path::PathBuf;

use tracing::debug;

use crate::config::{self, ApiConfig};

/// Run a shell command and capture its stdout as a token
fn try_cli_token(command: &str) -> Option<String> {
    let output = std::process::Command::new("sh")
        .args(["-c", command])
        .output()
        .ok()?;

    if output.status.success() {
        non_empty(String::from_utf8_lossy(&output.stdout).to_string())
    } else {
        None
    }
}

/// Stored token path: ~/.config/pixelshelf/token
fn token_path() -> Option<PathBuf> {
    Some(config::config_dir()?.join("token"))
}

fn load_stored_token() -> Option<String> {
    let token = std::fs::read_to_string(token_path()?).ok()?;
    non_empty(token)
}

fn save_token(token: &str) -> std::io::Result<()> {
    if let Some(path) = token_path() {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, token)?;
    }
    Ok(())
}

fn non_empty(token: String) -> Option<String> {
    let token = token.trim().to_string();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Find an API token, trying in order:
/// 1. The configured env var
/// 2. The stored token in ~/.config/pixelshelf/token
/// 3. The configured token command (its output is stored for next time)
///
/// `None` means the client runs signed out.
pub fn load_token(api: &ApiConfig) -> Option<String> {
    if let Some(env_var) = &api.token_env {
        if let Ok(token) = std::env::var(env_var) {
            if let Some(token) = non_empty(token) {
                debug!(%env_var, "using token from environment");
                return Some(token);
            }
        }
    }

    if let Some(token) = load_stored_token() {
        debug!("using stored token");
        return Some(token);
    }

    if let Some(cmd) = &api.token_command {
        if let Some(token) = try_cli_token(cmd) {
            if let Err(e) = save_token(&token) {
                debug!("could not store token: {}", e);
            }
            return Some(token);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_token_is_trimmed() {
        assert_eq!(try_cli_token("echo '  tok-123  '"), Some("tok-123".to_string()));
    }

    #[test]
    fn failing_command_gives_no_token() {
        assert_eq!(try_cli_token("exit 1"), None);
    }

    #[test]
    fn empty_output_gives_no_token() {
        assert_eq!(try_cli_token("printf ''"), None);
    }
}
