use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;

/// Sends a single reply line to the client. The full reply is always on
/// the wire before the command loop reads the next command.
pub async fn send_reply(
    writer: &Arc<Mutex<OwnedWriteHalf>>,
    code: u16,
    text: &str,
) -> Result<(), std::io::Error> {
    let line = format!("{} {}\r\n", code, text);
    let mut writer = writer.lock().await;
    writer.write_all(line.as_bytes()).await?;
    debug!("Sent reply: {} {}", code, text);
    Ok(())
}

/// Resolves a client-supplied path against the served root and the
/// session's working directory. The canonical result must stay under the
/// root; anything else (including paths that fail to canonicalize) is an
/// error and the caller replies 550 without touching anything.
///
/// `base` must already be canonical.
pub fn resolve_path(base: &Path, current_dir: &str, arg: &str) -> io::Result<PathBuf> {
    let candidate = if let Some(absolute) = arg.strip_prefix('/') {
        base.join(absolute)
    } else {
        base.join(current_dir.trim_start_matches('/')).join(arg)
    };
    let canonical = candidate.canonicalize()?;
    if canonical.starts_with(base) {
        Ok(canonical)
    } else {
        Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "path escapes the served root",
        ))
    }
}

/// Like [`resolve_path`] but for a file that may not exist yet: the
/// parent directory is resolved through the sandbox and the final name is
/// appended to the canonical result.
pub fn resolve_parent_for_create(
    base: &Path,
    current_dir: &str,
    arg: &str,
) -> io::Result<PathBuf> {
    let rel = Path::new(arg);
    let name = rel.file_name().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "missing file name")
    })?;
    let parent = rel
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();
    let parent_arg = if parent.is_empty() {
        if arg.starts_with('/') { "/" } else { "." }.to_string()
    } else {
        parent
    };
    let dir = resolve_path(base, current_dir, &parent_arg)?;
    Ok(dir.join(name))
}

/// Client-visible form of a canonical path: the root prefix stripped, a
/// leading and trailing `/` kept.
pub fn display_path(base: &Path, canonical: &Path) -> String {
    let rel = canonical.strip_prefix(base).unwrap_or(canonical);
    let rel = rel.to_string_lossy();
    if rel.is_empty() {
        String::from("/")
    } else {
        format!("/{}/", rel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn sandbox_root() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/b/c")).unwrap();
        fs::write(dir.path().join("a/file.txt"), b"data").unwrap();
        let base = dir.path().canonicalize().unwrap();
        (dir, base)
    }

    #[test]
    fn relative_path_resolves_under_cwd() {
        let (_dir, base) = sandbox_root();
        let resolved = resolve_path(&base, "/a/", "b/c").unwrap();
        assert_eq!(resolved, base.join("a/b/c"));
        assert_eq!(display_path(&base, &resolved), "/a/b/c/");
    }

    #[test]
    fn traversal_outside_the_root_is_rejected() {
        let (_dir, base) = sandbox_root();
        assert!(resolve_path(&base, "/a/", "../../etc/passwd").is_err());
    }

    #[test]
    fn dot_dot_inside_the_root_is_fine() {
        let (_dir, base) = sandbox_root();
        let resolved = resolve_path(&base, "/a/b/", "..").unwrap();
        assert_eq!(resolved, base.join("a"));
        assert_eq!(display_path(&base, &resolved), "/a/");
    }

    #[test]
    fn absolute_path_ignores_cwd() {
        let (_dir, base) = sandbox_root();
        let resolved = resolve_path(&base, "/a/b/", "/a/file.txt").unwrap();
        assert_eq!(resolved, base.join("a/file.txt"));
    }

    #[test]
    fn nonexistent_path_is_an_error() {
        let (_dir, base) = sandbox_root();
        assert!(resolve_path(&base, "/", "no/such/dir").is_err());
    }

    #[test]
    fn root_displays_as_a_single_slash() {
        let (_dir, base) = sandbox_root();
        let resolved = resolve_path(&base, "/a/", "..").unwrap();
        assert_eq!(display_path(&base, &resolved), "/");
    }

    #[test]
    fn create_target_resolves_its_parent() {
        let (_dir, base) = sandbox_root();
        let target = resolve_parent_for_create(&base, "/a/", "upload.bin").unwrap();
        assert_eq!(target, base.join("a/upload.bin"));

        assert!(resolve_parent_for_create(&base, "/a/", "../../escape.bin").is_err());
    }
}
