use std::path::{Path, PathBuf};
use std::process::Command;

/// Detect the user's preferred editor.
/// Checks VISUAL -> EDITOR -> "vi"
pub fn detect_editor() -> String {
    for var in ["VISUAL", "EDITOR"] {
        if let Ok(editor) = std::env::var(var) {
            if !editor.trim().is_empty() {
                return editor;
            }
        }
    }
    "vi".to_string()
}

fn scratch_path(dir: &Path) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    dir.join(format!(
        "pixelshelf-profile-{}-{}.toml",
        std::process::id(),
        nanos
    ))
}

/// Write `initial` to a scratch file, let the editor change it and return
/// the result. The terminal must already be released by the caller.
pub fn edit_text(initial: &str, editor_cmd: &str) -> std::io::Result<String> {
    edit_text_in(&std::env::temp_dir(), initial, editor_cmd)
}

fn edit_text_in(dir: &Path, initial: &str, editor_cmd: &str) -> std::io::Result<String> {
    let path = scratch_path(dir);
    std::fs::write(&path, initial)?;

    // The path goes in as $1 so the shell never parses it
    let cmd = format!("{} \"$1\"", ensure_wait_flag(editor_cmd));
    let status = Command::new("sh")
        .arg("-c")
        .arg(&cmd)
        .arg("sh")
        .arg(&path)
        .status();

    let result = match status {
        Ok(status) if status.success() => std::fs::read_to_string(&path),
        Ok(status) => Err(std::io::Error::other(format!(
            "editor exited with {}",
            status
        ))),
        Err(e) => Err(e),
    };
    let _ = std::fs::remove_file(&path);
    result
}

/// GUI editors return immediately unless told to wait for the file to be
/// closed. Append the flag when the command names one of them without it.
fn ensure_wait_flag(editor_cmd: &str) -> String {
    let program = editor_cmd.split_whitespace().next().unwrap_or("");
    let name = program.rsplit('/').next().unwrap_or(program);

    let flag = match name {
        "code" | "codium" | "zed" => "--wait",
        "subl" | "mate" => "-w",
        _ => return editor_cmd.to_string(),
    };

    let has_flag = editor_cmd
        .split_whitespace()
        .any(|tok| tok == flag || tok == "--wait" || tok == "-w");
    if has_flag {
        editor_cmd.to_string()
    } else {
        format!("{} {}", editor_cmd, flag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_code_gets_wait() {
        assert_eq!(ensure_wait_flag("code"), "code --wait");
    }

    #[test]
    fn code_with_explicit_wait_unchanged() {
        assert_eq!(ensure_wait_flag("code --wait -n"), "code --wait -n");
    }

    #[test]
    fn absolute_path_subl_gets_w() {
        assert_eq!(ensure_wait_flag("/usr/local/bin/subl"), "/usr/local/bin/subl -w");
    }

    #[test]
    fn terminal_editors_unchanged() {
        assert_eq!(ensure_wait_flag("vim"), "vim");
        assert_eq!(ensure_wait_flag("nano -l"), "nano -l");
    }

    #[test]
    fn codeword_unchanged() {
        // "codex" shouldn't match
        assert_eq!(ensure_wait_flag("codex"), "codex");
    }

    #[test]
    fn edit_text_runs_editor_on_scratch_file() {
        let edited = edit_text("name = \"a\"\n", r#"sed -i 's/"a"/"b"/'"#).unwrap();
        assert_eq!(edited, "name = \"b\"\n");
    }

    #[test]
    fn scratch_dir_with_quotes_reaches_the_editor() {
        let dir = std::env::temp_dir().join(format!("pixelshelf 'quoted' {}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let edited = edit_text_in(&dir, "name = \"a\"\n", r#"sed -i 's/"a"/"b"/'"#);
        let _ = std::fs::remove_dir_all(&dir);
        assert_eq!(edited.unwrap(), "name = \"b\"\n");
    }

    #[test]
    fn failing_editor_is_an_error() {
        assert!(edit_text("x", "false").is_err());
    }
}
