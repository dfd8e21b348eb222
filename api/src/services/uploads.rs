//! Scoped temporary storage for uploaded images

use log::{info, warn};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::constants::ALLOWED_EXTENSIONS;

/// Upload written to the temp directory for the lifetime of one request.
/// The file is removed when the guard drops, on success, error or panic.
#[derive(Debug)]
pub struct TempUpload {
    path: PathBuf,
}

impl TempUpload {
    /// Write `bytes` to `<dir>/<uuid>_<sanitized filename>`
    pub async fn persist(dir: &Path, filename: &str, bytes: &[u8]) -> std::io::Result<Self> {
        let path = dir.join(format!(
            "{}_{}",
            Uuid::new_v4().simple(),
            sanitize_filename(filename)
        ));

        // Guard first so a partial write is cleaned up too
        let upload = Self { path };
        tokio::fs::write(&upload.path, bytes).await?;
        info!("File saved temporarily at: {}", upload.path.display());
        Ok(upload)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => info!("Temporary file removed: {}", self.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove temporary file {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

/// Reduce a client-supplied filename to a safe single path component.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();

    let trimmed = cleaned.trim_start_matches(['.', '_']);
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed.to_string()
    }
}

/// True when the text after the last `.` is an accepted image extension
pub fn has_allowed_extension(filename: &str) -> bool {
    filename.rsplit_once('.').is_some_and(|(_, ext)| {
        ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_paths_and_odd_characters() {
        assert_eq!(sanitize_filename("../../etc/passwd.png"), "passwd.png");
        assert_eq!(sanitize_filename("C:\\scans\\cert 01.JPG"), "cert_01.JPG");
        assert_eq!(sanitize_filename("..hidden.png"), "hidden.png");
        assert_eq!(sanitize_filename("zertifikat-ä.jpeg"), "zertifikat-.jpeg");
        assert_eq!(sanitize_filename("///"), "upload");
        assert_eq!(sanitize_filename(""), "upload");
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        assert!(has_allowed_extension("cert.png"));
        assert!(has_allowed_extension("cert.JPG"));
        assert!(has_allowed_extension("archive.tar.jpeg"));
        assert!(!has_allowed_extension("cert.gif"));
        assert!(!has_allowed_extension("png"));
        assert!(!has_allowed_extension("cert.png.exe"));
    }

    #[tokio::test]
    async fn guard_removes_file_and_paths_are_unique() {
        let dir = std::env::temp_dir().join(format!("certverify-uploads-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();

        let first = TempUpload::persist(&dir, "cert.png", b"one").await.unwrap();
        let second = TempUpload::persist(&dir, "cert.png", b"two").await.unwrap();
        assert_ne!(first.path(), second.path());
        assert_eq!(std::fs::read(first.path()).unwrap(), b"one");
        assert_eq!(std::fs::read(second.path()).unwrap(), b"two");

        let path = first.path().to_path_buf();
        drop(first);
        assert!(!path.exists());
        drop(second);
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);

        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn failed_write_leaves_nothing_behind() {
        let dir = std::env::temp_dir().join(format!("certverify-absent-{}", Uuid::new_v4()));
        assert!(TempUpload::persist(&dir, "cert.png", b"x").await.is_err());
        assert!(!dir.exists());
    }
}
