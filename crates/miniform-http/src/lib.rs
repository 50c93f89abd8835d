//! # miniform-http
//!
//! Request-side plumbing for miniform forms: [`QueryDict`] for urlencoded
//! pairs, a binary-safe multipart parser producing [`UploadedFile`]s, the
//! combined [`FormData`] a form binds, and an axum extractor for it.

pub mod extract;
pub mod form_data;
pub mod querydict;
pub mod upload;

pub use extract::FormRejection;
pub use form_data::FormData;
pub use querydict::QueryDict;
pub use upload::{MultipartData, UploadedFile};
