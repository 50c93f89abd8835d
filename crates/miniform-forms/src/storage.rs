//! Filesystem storage for file and image columns.
//!
//! Uploads are written under `root/upload_to/` and the column stores the
//! path relative to `root`. Names are reduced to a safe form and never
//! overwrite an existing file: `report.pdf` becomes `report(2).pdf`, then
//! `report(3).pdf`, and so on.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use miniform_core::error::{MiniformError, MiniformResult};
use miniform_core::settings::SETTINGS;
use miniform_core::utils::text::transliterate;
use miniform_db::fields::FileConfig;
use miniform_http::UploadedFile;
use percent_encoding::percent_decode_str;
use regex::Regex;

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\-.]").expect("valid regex"))
}

/// Local filesystem storage rooted at a media directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    /// Directory that relative paths are resolved against.
    pub root: PathBuf,
    /// URL prefix files are served under.
    pub base_url: String,
}

impl Default for FileStorage {
    /// Uses `media_root` and `media_url` from the settings.
    fn default() -> Self {
        let settings = SETTINGS.get_or_default();
        Self::new(settings.media_root.clone(), settings.media_url.clone())
    }
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into(),
        }
    }

    /// The absolute location of a stored file.
    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// The URL a stored file is served at.
    pub fn url(&self, name: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let name = name.trim_start_matches('/');
        format!("{base}/{name}")
    }

    /// Turns a submitted file name into the name the file is saved under.
    ///
    /// Cyrillic is transliterated when the column asks for it and
    /// percent-escapes are decoded before the column's extension rules run.
    pub fn validate_filename(config: &FileConfig, submitted: &str) -> MiniformResult<String> {
        let name = if config.name_translate {
            transliterate(submitted)
        } else {
            submitted.to_string()
        };
        let decoded = percent_decode_str(&name).decode_utf8_lossy();
        config
            .validate_filename(&decoded)
            .map_err(MiniformError::Upload)
    }

    /// Picks a free path for `filename` inside `dir`.
    ///
    /// Spaces become underscores and anything but word characters, `-`
    /// and `.` is dropped. A name left with nothing but punctuation becomes
    /// `file` plus the original extension.
    pub async fn unique_path(dir: &Path, filename: &str) -> MiniformResult<PathBuf> {
        let mut clean = unsafe_chars()
            .replace_all(&filename.replace(' ', "_"), "")
            .into_owned();
        if clean.trim_matches(['.', '_', '-']).is_empty() {
            clean = match Path::new(filename).extension() {
                Some(ext) => format!("file.{}", ext.to_string_lossy()),
                None => "file".to_string(),
            };
        }

        let mut candidate = dir.join(&clean);
        let (base, ext) = split_name(&clean);
        let mut counter = 2;
        while tokio::fs::try_exists(&candidate).await? {
            candidate = dir.join(format!("{base}({counter}){ext}"));
            counter += 1;
        }
        Ok(candidate)
    }

    /// Writes an upload for a column configured by `config`.
    ///
    /// Returns `None` when nothing was uploaded (the column keeps its
    /// value), `Some("")` for an allowed empty file, and otherwise the new
    /// path relative to the root. Replacing the previous file is left to
    /// the caller so it can wait for the transaction to commit.
    pub async fn save(
        &self,
        config: &FileConfig,
        upload: &UploadedFile,
    ) -> MiniformResult<Option<String>> {
        if upload.is_empty() {
            return Ok(None);
        }
        if !config.check_size(upload.size).map_err(MiniformError::Upload)? {
            return Ok(Some(String::new()));
        }

        let filename = Self::validate_filename(config, &upload.name)?;
        let dir = self.root.join(&config.upload_to);
        tokio::fs::create_dir_all(&dir).await?;
        let path = Self::unique_path(&dir, &filename).await?;
        tokio::fs::write(&path, &upload.content).await?;

        let stored = path
            .strip_prefix(&self.root)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");
        tracing::debug!(path = %stored, size = upload.size, "stored upload");
        Ok(Some(stored))
    }

    /// Removes a stored file. A file that is already gone is not an error.
    pub async fn delete(&self, name: &str) -> MiniformResult<()> {
        if name.is_empty() {
            return Ok(());
        }
        match tokio::fs::remove_file(self.path(name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MiniformError::IoError(e)),
        }
    }

    /// Removes a stored file without awaiting; for transaction callbacks.
    /// Failures are logged, not returned.
    pub fn discard(&self, name: &str) {
        if name.is_empty() {
            return;
        }
        match std::fs::remove_file(self.path(name)) {
            Ok(()) => tracing::debug!(path = %name, "removed upload"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %name, error = %e, "failed to remove upload"),
        }
    }

    /// Returns `true` if a stored file exists.
    pub async fn exists(&self, name: &str) -> MiniformResult<bool> {
        Ok(tokio::fs::try_exists(self.path(name)).await?)
    }
}

/// Splits `name` into base and extension (with its dot).
fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TempRoot(PathBuf);

    impl TempRoot {
        fn new() -> Self {
            Self(std::env::temp_dir().join(format!("miniform-storage-{}", uuid::Uuid::new_v4())))
        }

        fn storage(&self) -> FileStorage {
            FileStorage::new(&self.0, "/media/")
        }
    }

    impl Drop for TempRoot {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }

    fn docs() -> FileConfig {
        FileConfig::new("docs", 1).allowed_extensions([".pdf", ".txt"])
    }

    #[test]
    fn test_validate_filename() {
        assert_eq!(
            FileStorage::validate_filename(&docs(), "C:\\tmp\\My%20Report.PDF").unwrap(),
            "My Report.pdf"
        );
        let err = FileStorage::validate_filename(&docs(), "run.exe").unwrap_err();
        assert!(matches!(err, MiniformError::Upload(ref m) if m == "File type '.exe' is not allowed"));
    }

    #[test]
    fn test_validate_filename_transliterates() {
        let config = docs().name_translate();
        assert_eq!(
            FileStorage::validate_filename(&config, "Отчёт.txt").unwrap(),
            "Otchyot.txt"
        );
    }

    #[test]
    fn test_url() {
        let storage = FileStorage::new("/srv/media", "/media/");
        assert_eq!(storage.url("docs/a.pdf"), "/media/docs/a.pdf");
        assert_eq!(storage.path("docs/a.pdf"), PathBuf::from("/srv/media/docs/a.pdf"));
    }

    #[tokio::test]
    async fn test_save_and_collisions() {
        let root = TempRoot::new();
        let storage = root.storage();
        let upload = UploadedFile::new("my report.pdf", "application/pdf", b"%PDF-1.4".to_vec());

        let first = storage.save(&docs(), &upload).await.unwrap();
        assert_eq!(first.as_deref(), Some("docs/my_report.pdf"));
        let second = storage.save(&docs(), &upload).await.unwrap();
        assert_eq!(second.as_deref(), Some("docs/my_report(2).pdf"));
        let third = storage.save(&docs(), &upload).await.unwrap();
        assert_eq!(third.as_deref(), Some("docs/my_report(3).pdf"));

        let content = tokio::fs::read(storage.path("docs/my_report.pdf")).await.unwrap();
        assert_eq!(content, b"%PDF-1.4");
    }

    #[tokio::test]
    async fn test_save_sanitises_names() {
        let root = TempRoot::new();
        let storage = root.storage();
        let upload = UploadedFile::new("<b> résumé.txt", "text/plain", b"hi".to_vec());
        let saved = storage.save(&docs(), &upload).await.unwrap();
        assert_eq!(saved.as_deref(), Some("docs/b_résumé.txt"));
    }

    #[tokio::test]
    async fn test_unique_path_fallback_name() {
        let root = TempRoot::new();
        let path = FileStorage::unique_path(&root.0, "<>").await.unwrap();
        assert_eq!(path, root.0.join("file"));
    }

    #[tokio::test]
    async fn test_save_empty_and_oversized() {
        let root = TempRoot::new();
        let storage = root.storage();

        let untouched = UploadedFile::new("", "application/octet-stream", Vec::new());
        assert_eq!(storage.save(&docs(), &untouched).await.unwrap(), None);

        let empty = UploadedFile::new("a.txt", "text/plain", Vec::new());
        let err = storage.save(&docs(), &empty).await.unwrap_err();
        assert!(matches!(err, MiniformError::Upload(ref m) if m == "File must be not empty"));
        let allowed = docs().file_is_empty();
        assert_eq!(storage.save(&allowed, &empty).await.unwrap().as_deref(), Some(""));

        let big = UploadedFile::new("a.txt", "text/plain", vec![b'x'; 2048]);
        let err = storage.save(&docs(), &big).await.unwrap_err();
        assert!(matches!(err, MiniformError::Upload(ref m) if m == "File size exceeds maximum allowed 1KB"));
    }

    #[tokio::test]
    async fn test_delete_and_exists() {
        let root = TempRoot::new();
        let storage = root.storage();
        let upload = UploadedFile::new("a.txt", "text/plain", b"hi".to_vec());
        let saved = storage.save(&docs(), &upload).await.unwrap().unwrap();
        assert!(storage.exists(&saved).await.unwrap());
        storage.delete(&saved).await.unwrap();
        assert!(!storage.exists(&saved).await.unwrap());
        storage.delete(&saved).await.unwrap();

        let again = storage.save(&docs(), &upload).await.unwrap().unwrap();
        storage.discard(&again);
        storage.discard(&again);
        assert!(!storage.exists(&again).await.unwrap());
    }
}
