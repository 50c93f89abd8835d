//! Submitted form data: text fields plus uploaded files.

use miniform_core::utils::MultiValueDict;
use miniform_core::{MiniformError, MiniformResult};

use crate::querydict::QueryDict;
use crate::upload::{parse_multipart, MultipartData, UploadedFile};

/// The data a form binds: field values and uploaded files keyed by input name.
///
/// # Examples
///
/// ```
/// use miniform_http::FormData;
///
/// let data = FormData::parse(
///     "application/x-www-form-urlencoded",
///     b"name=Ann&age=31",
///     1024,
/// )
/// .unwrap();
/// assert_eq!(data.get("age"), Some("31"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct FormData {
    pub fields: MultiValueDict<String, String>,
    pub files: MultiValueDict<String, UploadedFile>,
}

impl FormData {
    pub const fn new() -> Self {
        Self {
            fields: MultiValueDict::new(),
            files: MultiValueDict::new(),
        }
    }

    /// Builds data from `(name, value)` text pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            files: MultiValueDict::new(),
        }
    }

    /// Parses a request body according to its content type.
    ///
    /// # Errors
    ///
    /// Returns [`MiniformError::UnsupportedMediaType`] for anything but
    /// urlencoded or multipart bodies, [`MiniformError::BadRequest`] for a
    /// multipart type without boundary or a non UTF-8 urlencoded body, and
    /// upload errors from [`parse_multipart`].
    pub fn parse(content_type: &str, body: &[u8], max_size: usize) -> MiniformResult<Self> {
        let mime: mime::Mime = content_type
            .parse()
            .map_err(|_| MiniformError::UnsupportedMediaType(content_type.to_string()))?;

        match (mime.type_(), mime.subtype()) {
            (mime::APPLICATION, mime::WWW_FORM_URLENCODED) => {
                let text = std::str::from_utf8(body).map_err(|e| {
                    MiniformError::BadRequest(format!("Form body is not valid UTF-8: {e}"))
                })?;
                Ok(QueryDict::parse(text).into())
            }
            (mime::MULTIPART, mime::FORM_DATA) => {
                let boundary = mime.get_param(mime::BOUNDARY).ok_or_else(|| {
                    MiniformError::BadRequest("Multipart body without boundary".to_string())
                })?;
                Ok(parse_multipart(body, boundary.as_str(), max_size)?.into())
            }
            _ => Err(MiniformError::UnsupportedMediaType(mime.essence_str().to_string())),
        }
    }

    /// The last value submitted for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn get_list(&self, name: &str) -> Option<&[String]> {
        self.fields.get_list(name)
    }

    /// The last file uploaded under `name`.
    pub fn get_file(&self, name: &str) -> Option<&UploadedFile> {
        self.files.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.set(name.into(), value.into());
    }

    pub fn insert_file(&mut self, name: impl Into<String>, file: UploadedFile) {
        self.files.set(name.into(), file);
    }

    /// `true` if `name` was submitted as a field or a file.
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name) || self.files.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.files.is_empty()
    }
}

impl From<QueryDict> for FormData {
    fn from(qd: QueryDict) -> Self {
        Self {
            fields: qd.into_inner(),
            files: MultiValueDict::new(),
        }
    }
}

impl From<MultipartData> for FormData {
    fn from(data: MultipartData) -> Self {
        Self {
            fields: data.fields,
            files: data.files,
        }
    }
}
