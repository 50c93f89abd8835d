//! `multipart/form-data` parsing.
//!
//! The parser works on raw bytes, so binary uploads survive intact. Text
//! parts become form fields; parts with a `filename` become
//! [`UploadedFile`]s held in memory up to a configurable limit.

use miniform_core::utils::MultiValueDict;
use miniform_core::{MiniformError, MiniformResult};

/// A file received in a multipart submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// The client-side filename.
    pub name: String,
    /// The declared MIME type, `application/octet-stream` when absent.
    pub content_type: String,
    /// Content length in bytes.
    pub size: usize,
    pub content: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            size: content.len(),
            content,
        }
    }

    /// `true` when the upload carries no name and no bytes, which is what
    /// browsers send for an untouched file input.
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.content.is_empty()
    }
}

/// Fields and files of a parsed multipart body, in submission order.
#[derive(Debug, Clone, Default)]
pub struct MultipartData {
    pub fields: MultiValueDict<String, String>,
    pub files: MultiValueDict<String, UploadedFile>,
}

/// Reads the `boundary` parameter of a multipart content type.
///
/// ```
/// use miniform_http::upload::extract_boundary;
///
/// assert_eq!(extract_boundary("multipart/form-data; boundary=\"xyz\""), Some("xyz"));
/// assert_eq!(extract_boundary("multipart/form-data"), None);
/// ```
pub fn extract_boundary(content_type: &str) -> Option<&str> {
    content_type
        .split(';')
        .filter_map(|param| param.trim().split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, value)| value.trim().trim_matches('"'))
        .filter(|boundary| !boundary.is_empty())
}

/// Parses a multipart body delimited by `boundary`.
///
/// Untouched file inputs (empty filename and body) are dropped.
///
/// # Errors
///
/// Returns [`MiniformError::Upload`] when a file exceeds `max_size` bytes
/// and [`MiniformError::BadRequest`] when a part has no header block.
pub fn parse_multipart(body: &[u8], boundary: &str, max_size: usize) -> MiniformResult<MultipartData> {
    let delimiter = format!("--{boundary}").into_bytes();
    let mut data = MultipartData::default();

    let Some(mut cursor) = find(body, &delimiter, 0) else {
        return Ok(data);
    };

    loop {
        let start = cursor + delimiter.len();
        let rest = &body[start..];
        if rest.starts_with(b"--") {
            break;
        }
        let Some(next) = find(body, &delimiter, start) else {
            break;
        };
        let part = trim_line_break_end(trim_line_break_start(&body[start..next]));
        parse_part(part, max_size, &mut data)?;
        cursor = next;
    }

    tracing::debug!(
        fields = data.fields.len(),
        files = data.files.len(),
        "parsed multipart body"
    );
    Ok(data)
}

fn parse_part(part: &[u8], max_size: usize, data: &mut MultipartData) -> MiniformResult<()> {
    let (head, content) = if let Some(pos) = find(part, b"\r\n\r\n", 0) {
        (&part[..pos], &part[pos + 4..])
    } else if let Some(pos) = find(part, b"\n\n", 0) {
        (&part[..pos], &part[pos + 2..])
    } else {
        return Err(MiniformError::BadRequest(
            "Malformed multipart part: missing header block".to_string(),
        ));
    };

    let head = String::from_utf8_lossy(head);
    let mut name = None;
    let mut filename = None;
    let mut content_type = None;
    for line in head.lines() {
        let Some((header, value)) = line.split_once(':') else {
            continue;
        };
        if header.trim().eq_ignore_ascii_case("content-disposition") {
            name = header_param(value, "name");
            filename = header_param(value, "filename");
        } else if header.trim().eq_ignore_ascii_case("content-type") {
            content_type = Some(value.trim().to_string());
        }
    }

    let Some(name) = name else {
        return Ok(());
    };

    match filename {
        Some(filename) => {
            if filename.is_empty() && content.is_empty() {
                return Ok(());
            }
            if content.len() > max_size {
                return Err(MiniformError::Upload(format!(
                    "File '{filename}' exceeds maximum upload size of {max_size} bytes"
                )));
            }
            let file = UploadedFile::new(
                filename,
                content_type.unwrap_or_else(|| "application/octet-stream".to_string()),
                content.to_vec(),
            );
            data.files.append(name, file);
        }
        None => data
            .fields
            .append(name, String::from_utf8_lossy(content).into_owned()),
    }
    Ok(())
}

/// Extracts `key="value"` (or unquoted `key=value`) from a header value.
fn header_param(header_value: &str, key: &str) -> Option<String> {
    header_value.split(';').find_map(|param| {
        let (k, v) = param.trim().split_once('=')?;
        k.trim()
            .eq_ignore_ascii_case(key)
            .then(|| v.trim().trim_matches('"').to_string())
    })
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + from)
}

fn trim_line_break_start(bytes: &[u8]) -> &[u8] {
    bytes
        .strip_prefix(b"\r\n")
        .or_else(|| bytes.strip_prefix(b"\n"))
        .unwrap_or(bytes)
}

fn trim_line_break_end(bytes: &[u8]) -> &[u8] {
    bytes
        .strip_suffix(b"\r\n")
        .or_else(|| bytes.strip_suffix(b"\n"))
        .unwrap_or(bytes)
}
