use crate::error::ListenerError;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use keel_configutil::Listener;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::trace;

const DEFAULT_KEY: &str = "default";

/// Status-keyed response headers configured on one listener.
///
/// Keys are `default`, a status class such as `4xx`, or an exact code such as `404`.
/// A more specific key wins over a less specific one.
#[derive(Debug, Clone, Default)]
pub struct ListenerCustomHeaders {
    by_status: BTreeMap<String, HeaderMap>,
}

impl ListenerCustomHeaders {
    /// Validates and indexes the listener's `custom_response_headers`.
    ///
    /// # Errors
    /// Returns [`ListenerError::InvalidHeaders`] for an unknown or duplicated status key,
    /// or a header name or value that is not valid on the wire.
    pub fn new(listener: &Listener) -> Result<Self, ListenerError> {
        Self::from_map(&listener.custom_response_headers)
    }

    pub fn from_map(raw: &BTreeMap<String, BTreeMap<String, String>>) -> Result<Self, ListenerError> {
        let mut by_status = BTreeMap::new();
        for (status, headers) in raw {
            let key = normalize_status_key(status)?;
            let mut map = HeaderMap::with_capacity(headers.len());
            for (name, value) in headers {
                if name.trim().is_empty() {
                    return Err(ListenerError::headers(key.clone(), "header name must not be empty"));
                }
                let header = HeaderName::from_bytes(name.trim().as_bytes())
                    .map_err(|e| ListenerError::headers(key.clone(), format!("{name:?}: {e}")))?;
                let value = HeaderValue::from_str(value)
                    .map_err(|e| ListenerError::headers(key.clone(), format!("value of {name:?}: {e}")))?;
                map.insert(header, value);
            }
            if by_status.contains_key(&key) {
                return Err(ListenerError::headers(key, format!("{status:?} duplicates another status key")));
            }
            by_status.insert(key, map);
        }
        Ok(Self { by_status })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_status.values().all(HeaderMap::is_empty)
    }

    /// Looks a header up for `status`: exact code, then status class, then `default`.
    #[must_use]
    pub fn fetch_header_for_status(&self, name: &str, status: u16) -> Option<&str> {
        let name = HeaderName::from_bytes(name.as_bytes()).ok()?;
        status_keys(status)
            .iter()
            .rev()
            .filter_map(|key| self.by_status.get(key.as_str()))
            .find_map(|headers| headers.get(&name))
            .and_then(|value| value.to_str().ok())
    }

    /// The full header set for `status`, layered `default`, class, exact code.
    #[must_use]
    pub fn headers_for_status(&self, status: u16) -> HeaderMap {
        let mut merged = HeaderMap::new();
        for key in status_keys(status) {
            if let Some(headers) = self.by_status.get(key.as_str()) {
                for (name, value) in headers {
                    merged.insert(name.clone(), value.clone());
                }
            }
        }
        merged
    }

    /// Whether `name` is configured under any status key. Case-insensitive.
    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        HeaderName::from_bytes(name.as_bytes())
            .is_ok_and(|name| self.by_status.values().any(|headers| headers.contains_key(&name)))
    }
}

/// `[default, Nxx, NNN]`, least specific first.
fn status_keys(status: u16) -> [String; 3] {
    [DEFAULT_KEY.to_owned(), format!("{}xx", status / 100), status.to_string()]
}

fn normalize_status_key(raw: &str) -> Result<String, ListenerError> {
    let key = raw.trim().to_ascii_lowercase();
    let valid = match key.as_bytes() {
        b"default" => true,
        [b'1'..=b'5', b'x', b'x'] => true,
        [a, b, c] if a.is_ascii_digit() && b.is_ascii_digit() && c.is_ascii_digit() => {
            key.parse::<u16>().is_ok_and(|code| (100..=599).contains(&code))
        },
        _ => false,
    };
    if valid {
        Ok(key)
    } else {
        Err(ListenerError::headers(
            raw.to_owned(),
            "status key must be \"default\", a class like \"4xx\" or a code between 100 and 599",
        ))
    }
}

/// Adds the configured headers to every response, replacing same-named headers the
/// handler set.
///
/// ```rust,ignore
/// let headers = Arc::new(ListenerCustomHeaders::new(&listener)?);
/// let app = Router::new()
///     .route("/", get(handler))
///     .layer(axum::middleware::from_fn_with_state(headers, custom_headers_middleware));
/// ```
pub async fn custom_headers_middleware(
    State(headers): State<Arc<ListenerCustomHeaders>>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let status = response.status().as_u16();
    let extra = headers.headers_for_status(status);
    trace!(status, count = extra.len(), "Applying custom response headers");
    for (name, value) in &extra {
        response.headers_mut().insert(name.clone(), value.clone());
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ListenerCustomHeaders {
        let raw: BTreeMap<String, BTreeMap<String, String>> = [
            ("default", vec![("X-Frame-Options", "deny"), ("Cache-Control", "no-store")]),
            ("4XX", vec![("Cache-Control", "no-cache")]),
            ("404", vec![("X-Missing", "yes")]),
            ("307", vec![("X-Frame-Options", "sameorigin")]),
        ]
        .into_iter()
        .map(|(status, headers)| {
            (status.to_owned(), headers.into_iter().map(|(k, v)| (k.to_owned(), v.to_owned())).collect())
        })
        .collect();
        ListenerCustomHeaders::from_map(&raw).unwrap()
    }

    #[test]
    fn test_precedence() {
        let h = table();
        assert_eq!(h.fetch_header_for_status("X-Frame-Options", 200), Some("deny"));
        assert_eq!(h.fetch_header_for_status("x-frame-options", 307), Some("sameorigin"));
        assert_eq!(h.fetch_header_for_status("Cache-Control", 404), Some("no-cache"));
        assert_eq!(h.fetch_header_for_status("Cache-Control", 500), Some("no-store"));
        assert_eq!(h.fetch_header_for_status("X-Missing", 404), Some("yes"));
        assert_eq!(h.fetch_header_for_status("X-Missing", 403), None);
    }

    #[test]
    fn test_headers_for_status_layers() {
        let merged = table().headers_for_status(404);
        assert_eq!(merged["cache-control"], "no-cache");
        assert_eq!(merged["x-frame-options"], "deny");
        assert_eq!(merged["x-missing"], "yes");
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn test_exists() {
        let h = table();
        assert!(h.exists("x-missing"));
        assert!(h.exists("CACHE-CONTROL"));
        assert!(!h.exists("Server"));
        assert!(!h.exists("bad header"));
    }

    #[test]
    fn test_rejects_bad_keys() {
        for key in ["6xx", "0xx", "99", "600", "abc", "20x", ""] {
            let raw = BTreeMap::from([(key.to_owned(), BTreeMap::new())]);
            assert!(ListenerCustomHeaders::from_map(&raw).is_err(), "{key:?} should be rejected");
        }
        for key in ["default", "DEFAULT", "1xx", "5xx", "100", "599"] {
            let raw = BTreeMap::from([(key.to_owned(), BTreeMap::new())]);
            assert!(ListenerCustomHeaders::from_map(&raw).is_ok(), "{key:?} should be accepted");
        }
    }

    #[test]
    fn test_rejects_keys_equal_after_normalizing() {
        let raw = BTreeMap::from([
            ("4XX".to_owned(), BTreeMap::from([("X-A".to_owned(), "1".to_owned())])),
            ("4xx".to_owned(), BTreeMap::from([("X-B".to_owned(), "2".to_owned())])),
        ]);
        let err = ListenerCustomHeaders::from_map(&raw).unwrap_err();
        assert!(matches!(err, ListenerError::InvalidHeaders { .. }));
        assert_eq!(err.context_message(), Some("4xx"));

        let raw = BTreeMap::from([("Default".to_owned(), BTreeMap::new()), ("default".to_owned(), BTreeMap::new())]);
        assert!(ListenerCustomHeaders::from_map(&raw).is_err());
    }

    #[test]
    fn test_rejects_bad_headers() {
        let raw = BTreeMap::from([(
            "default".to_owned(),
            BTreeMap::from([("Bad Name".to_owned(), "v".to_owned())]),
        )]);
        let err = ListenerCustomHeaders::from_map(&raw).unwrap_err();
        assert_eq!(err.context_message(), Some("default"));

        let raw = BTreeMap::from([(
            "default".to_owned(),
            BTreeMap::from([("X-Ok".to_owned(), "line\nbreak".to_owned())]),
        )]);
        assert!(ListenerCustomHeaders::from_map(&raw).is_err());
    }
}
