//! Utility types and functions for miniform.
//!
//! This module provides:
//! - [`MultiValueDict`]: An ordered dictionary that can hold multiple values per key.
//! - [`html`]: HTML escaping.
//! - [`text`]: String helpers (transliteration, character-class descriptions).

pub mod html;
mod multi_value_dict;
pub mod text;

pub use multi_value_dict::MultiValueDict;
