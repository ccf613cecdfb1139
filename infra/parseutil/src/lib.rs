//! # Parse utilities
//!
//! Lenient conversions used when reading operator-supplied configuration. Every helper
//! accepts a [`serde_json::Value`] because HCL attributes arrive as dynamically typed
//! values: a timeout may be written as `30`, `"30"` or `"30s"`, a list as `["a", "b"]`
//! or `"a, b"`.
//!
//! ```rust
//! use keel_parseutil::{parse_bool, parse_duration_second};
//! use serde_json::json;
//! use std::time::Duration;
//!
//! assert_eq!(parse_duration_second(&json!("1m30s")).unwrap(), Duration::from_secs(90));
//! assert_eq!(parse_duration_second(&json!(15)).unwrap(), Duration::from_secs(15));
//! assert!(parse_bool(&json!("yes")).unwrap());
//! ```

mod addrs;
mod duration;
mod error;
mod path;
mod scalar;

pub use addrs::{parse_addrs, parse_addrs_str};
pub use duration::{parse_duration, parse_duration_second};
pub use error::{ParseError, ParseErrorExt};
pub use path::{parse_path, parse_path_with};
pub use scalar::{parse_bool, parse_capacity_string, parse_comma_strings, parse_int, to_plain_string};
