//! Upload configuration for file and image columns.

use std::path::{Path, PathBuf};

/// Extension groups that may be listed in place of concrete extensions.
pub const EXTENSION_GROUPS: &[(&str, &[&str])] = &[
    ("image/*", &[".jpg", ".jpeg", ".png", ".gif", ".bmp", ".webp"]),
    ("document/*", &[".pdf", ".doc", ".docx", ".xls", ".xlsx", ".txt"]),
    ("audio/*", &[".mp3", ".wav", ".ogg", ".aac", ".flac", ".m4a", ".wma"]),
    ("video/*", &[".mp4", ".avi", ".mkv", ".mov", ".wmv", ".flv", ".webm", ".mpeg"]),
    ("archive/*", &[".zip", ".rar", ".7z", ".tar", ".gz", ".bz2", ".xz"]),
    ("text/*", &[".txt", ".csv", ".json", ".xml", ".html", ".css", ".js", ".log"]),
];

/// Expands group names such as `image/*` into concrete extensions.
///
/// Entries that are not groups are kept. The result has no duplicates and
/// keeps first-seen order.
///
/// # Examples
///
/// ```
/// use miniform_db::fields::expand_extensions;
///
/// let exts = expand_extensions(&[".txt", "archive/*", ".zip"]);
/// assert_eq!(exts[0], ".txt");
/// assert_eq!(exts[1], ".zip");
/// assert_eq!(exts.len(), 8);
/// ```
pub fn expand_extensions<S: AsRef<str>>(extensions: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for ext in extensions {
        let ext = ext.as_ref();
        let group = EXTENSION_GROUPS
            .iter()
            .find(|(name, _)| *name == ext)
            .map(|(_, members)| *members);
        match group {
            Some(members) => {
                for member in members {
                    if !out.iter().any(|e| e == member) {
                        out.push((*member).to_string());
                    }
                }
            }
            None => {
                if !out.iter().any(|e| e == ext) {
                    out.push(ext.to_string());
                }
            }
        }
    }
    out
}

/// Lowercases an extension and gives it a leading dot. Group names are only
/// lowercased.
fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.contains('/') || ext.starts_with('.') {
        ext
    } else {
        format!(".{ext}")
    }
}

/// Splits a file name into stem and extension the way a shell user expects:
/// leading dots belong to the stem and the extension keeps its dot.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if name[..idx].chars().any(|c| c != '.') => name.split_at(idx),
        _ => (name, ""),
    }
}

/// Upload rules for a `FileField` or `ImageField` column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileConfig {
    /// Directory, relative to the storage root, that files are written to.
    pub upload_to: PathBuf,
    /// Largest accepted upload, in bytes.
    pub max_size: usize,
    /// Accepted extensions (`.pdf`) or extension groups (`document/*`).
    /// Empty means any extension is accepted.
    pub allowed_extensions: Vec<String>,
    /// Whether an empty file may be submitted (it clears the column).
    pub file_is_empty: bool,
    /// Whether Cyrillic file names are transliterated before saving.
    pub name_translate: bool,
}

impl FileConfig {
    /// Creates a config accepting files up to `max_size_kb` kilobytes.
    pub fn new(upload_to: impl Into<PathBuf>, max_size_kb: usize) -> Self {
        Self {
            upload_to: upload_to.into(),
            max_size: max_size_kb * 1024,
            allowed_extensions: Vec::new(),
            file_is_empty: false,
            name_translate: false,
        }
    }

    /// Creates an image config; accepts the `image/*` group by default.
    pub fn image(upload_to: impl Into<PathBuf>, max_size_kb: usize) -> Self {
        Self::new(upload_to, max_size_kb).allowed_extensions(["image/*"])
    }

    /// Sets the accepted extensions, normalizing each entry.
    #[must_use]
    pub fn allowed_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_extensions = extensions
            .into_iter()
            .map(|e| normalize_extension(e.as_ref()))
            .collect();
        self
    }

    /// Allows empty uploads.
    #[must_use]
    pub const fn file_is_empty(mut self) -> Self {
        self.file_is_empty = true;
        self
    }

    /// Transliterates Cyrillic names before saving.
    #[must_use]
    pub const fn name_translate(mut self) -> Self {
        self.name_translate = true;
        self
    }

    /// Returns the accepted extensions with groups expanded.
    pub fn effective_extensions(&self) -> Vec<String> {
        expand_extensions(&self.allowed_extensions)
    }

    /// Checks an upload's size. `Ok(false)` means the upload is empty and
    /// allowed to be.
    pub fn check_size(&self, size: usize) -> Result<bool, String> {
        if size == 0 {
            return if self.file_is_empty {
                Ok(false)
            } else {
                Err("File must be not empty".to_string())
            };
        }
        if size > self.max_size {
            return Err(format!(
                "File size exceeds maximum allowed {}KB",
                self.max_size / 1024
            ));
        }
        Ok(true)
    }

    /// Reduces a submitted name to a safe base name and checks its extension.
    ///
    /// Directory parts are dropped, the extension is lowercased, a bare
    /// `.ext` name becomes `1.ext`.
    pub fn validate_filename(&self, filename: &str) -> Result<String, String> {
        let base = Path::new(&filename.replace('\\', "/"))
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (stem, ext) = split_extension(&base);
        let (mut stem, mut ext) = (stem.to_string(), ext.trim().to_lowercase());

        if stem.starts_with('.') && ext.is_empty() {
            ext = stem.to_lowercase();
            stem = String::new();
        }
        if stem.trim().is_empty() {
            stem = "1".to_string();
        }
        if ext.is_empty() || ext == "." {
            return Err("File must have an extension".to_string());
        }
        let allowed = self.effective_extensions();
        if !allowed.is_empty() && !allowed.contains(&ext) {
            return Err(format!("File type '{ext}' is not allowed"));
        }
        Ok(format!("{stem}{ext}"))
    }
}
