//! URL-encoded form data.
//!
//! [`QueryDict`] wraps [`MultiValueDict`] to hold the pairs of an
//! `application/x-www-form-urlencoded` body or a query string. Parsed
//! dictionaries are read-only; [`copy`](QueryDict::copy) gives a mutable one.

use miniform_core::utils::MultiValueDict;
use miniform_core::{MiniformError, MiniformResult};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters left unescaped by [`QueryDict::urlencode`], as browsers do.
const FORM_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'*')
    .remove(b'-')
    .remove(b'.')
    .remove(b'_');

/// Form pairs with repeated keys preserved in submission order.
///
/// # Examples
///
/// ```
/// use miniform_http::QueryDict;
///
/// let qd = QueryDict::parse("tags=a&tags=b&title=Hello+world");
/// assert_eq!(qd.get("tags"), Some("b"));
/// assert_eq!(qd.get_list("tags"), Some(&["a".to_string(), "b".to_string()][..]));
/// assert_eq!(qd.get("title"), Some("Hello world"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct QueryDict {
    data: MultiValueDict<String, String>,
    mutable: bool,
}

impl QueryDict {
    /// An empty, read-only dictionary.
    pub const fn new() -> Self {
        Self {
            data: MultiValueDict::new(),
            mutable: false,
        }
    }

    /// An empty dictionary that accepts `set` and `append`.
    pub const fn new_mutable() -> Self {
        Self {
            data: MultiValueDict::new(),
            mutable: true,
        }
    }

    /// Parses `key=value&...` text. `+` decodes to a space; pairs without
    /// `=` get an empty value; empty segments are skipped.
    pub fn parse(input: &str) -> Self {
        let data = input
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                (decode(key), decode(value))
            })
            .collect();
        Self {
            data,
            mutable: false,
        }
    }

    /// The last value submitted for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    /// Every value submitted for `key`.
    pub fn get_list(&self, key: &str) -> Option<&[String]> {
        self.data.get_list(key)
    }

    /// Replaces the values for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`MiniformError::BadRequest`] on a read-only dictionary.
    pub fn set(&mut self, key: &str, value: &str) -> MiniformResult<()> {
        self.ensure_mutable()?;
        self.data.set(key.to_string(), value.to_string());
        Ok(())
    }

    /// Adds a value for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`MiniformError::BadRequest`] on a read-only dictionary.
    pub fn append(&mut self, key: &str, value: &str) -> MiniformResult<()> {
        self.ensure_mutable()?;
        self.data.append(key.to_string(), value.to_string());
        Ok(())
    }

    fn ensure_mutable(&self) -> MiniformResult<()> {
        if self.mutable {
            Ok(())
        } else {
            Err(MiniformError::BadRequest(
                "This QueryDict instance is immutable".to_string(),
            ))
        }
    }

    /// A mutable clone.
    #[must_use]
    pub fn copy(&self) -> Self {
        Self {
            data: self.data.clone(),
            mutable: true,
        }
    }

    /// Encodes the pairs back to form text, in submission order.
    pub fn urlencode(&self) -> String {
        self.data
            .items()
            .flat_map(|(key, values)| {
                values
                    .iter()
                    .map(move |value| format!("{}={}", encode(key), encode(value)))
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    pub const fn is_mutable(&self) -> bool {
        self.mutable
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.data.keys()
    }

    /// Consumes the dictionary, returning the underlying pairs.
    pub fn into_inner(self) -> MultiValueDict<String, String> {
        self.data
    }
}

fn decode(input: &str) -> String {
    percent_decode_str(&input.replace('+', " "))
        .decode_utf8_lossy()
        .into_owned()
}

fn encode(input: &str) -> String {
    utf8_percent_encode(input, FORM_ENCODE_SET)
        .to_string()
        .replace("%20", "+")
}
