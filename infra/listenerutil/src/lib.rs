//! # Listener utilities
//!
//! Axum middleware and helpers driven by a parsed [`keel_configutil::Listener`]:
//!
//! - [`custom_headers_middleware`] adds the status-keyed `custom_response_headers`.
//! - [`forwarded_for_middleware`] trusts `X-Forwarded-For` from configured proxies.
//! - [`bind_unix_listener`] binds `unix` listeners with the configured mode and owner.

mod error;
mod headers;
#[cfg(unix)]
mod unix;
mod xff;

pub use error::{ListenerError, ListenerErrorExt};
pub use headers::{ListenerCustomHeaders, custom_headers_middleware};
#[cfg(unix)]
pub use unix::{UnixSocketOptions, bind_unix_listener};
pub use xff::{ClientAddr, X_FORWARDED_FOR, XffConfig, XffRejection, forwarded_for_middleware, trusted_client};
