//! Archive fetch and integrity-check primitives: `fetch`,
//! `verify_integrity`. The installer core treats this crate as an opaque
//! downloader; it never builds a `reqwest::Client` itself.

pub mod fetch;
pub mod validation;

pub use fetch::{fetch, verify_integrity};
pub use validation::validate_url;
