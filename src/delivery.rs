//! HTTP delivery middleware for mounted filesystems.
//!
//! Each [`Mount`] claims a slice of the URL space (by default the
//! mount root, matched case-insensitively on segment boundaries) and
//! serves GET/HEAD requests under it straight from the backing store.
//! Anything the middleware does not claim, or cannot find, falls
//! through to the next handler untouched, so the application behind it
//! keeps working for non-media routes.
//!
//! Single-range `Range` requests are honored with 206/416 responses;
//! syntactically invalid `Range` headers are ignored and the full body
//! is served, per RFC 9110.

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{
    ACCEPT_RANGES, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, ETAG,
    LAST_MODIFIED, RANGE, VARY,
};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::errors::FsError;
use crate::fs::MediaFileSystem;
use crate::paths::path_starts_with;
use crate::store::client::{ByteRange as StoreRange, ObjectMetadata};
use crate::AppState;

/// Cache policy for served media: publicly cacheable for seven days,
/// revalidated after that.
const CACHE_CONTROL_VALUE: &str = "public, must-revalidate, max-age=604800";

type ClaimsFn = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// One mounted filesystem: a registry name, the URL root it is served
/// under, and an optional custom claims predicate.
#[derive(Clone)]
pub struct Mount {
    /// Registry name of the filesystem backing this mount.
    pub name: String,
    /// URL root the mount claims, e.g. `/media`.
    pub root: String,
    claims: Option<ClaimsFn>,
}

impl Mount {
    /// Mount the filesystem registered under `name` at `root`.
    pub fn new(name: &str, root: &str) -> Self {
        Self {
            name: name.to_string(),
            root: root.trim_end_matches('/').to_string(),
            claims: None,
        }
    }

    /// Override the claims predicate.  The default claims any path under
    /// the mount root, matched case-insensitively on segment boundaries.
    pub fn with_claims(mut self, claims: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.claims = Some(Arc::new(claims));
        self
    }

    /// Whether this mount claims the request path.
    pub fn claims(&self, path: &str) -> bool {
        match &self.claims {
            Some(predicate) => predicate(path),
            None => path_starts_with(path, &self.root),
        }
    }
}

impl std::fmt::Debug for Mount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mount")
            .field("name", &self.name)
            .field("root", &self.root)
            .field("custom_claims", &self.claims.is_some())
            .finish()
    }
}

// -- Range parsing ------------------------------------------------------------

/// Parsed byte range from a Range header.
#[derive(Debug, Clone, PartialEq)]
enum RequestRange {
    /// bytes=start-end (inclusive both ends)
    StartEnd(u64, u64),
    /// bytes=start-  (from start to end of file)
    StartOpen(u64),
    /// bytes=-N  (last N bytes)
    Suffix(u64),
}

/// Parse a Range header value like "bytes=0-4", "bytes=5-", "bytes=-3".
/// Returns None if the header is not a valid single bytes range.
fn parse_range_header(range_str: &str) -> Option<RequestRange> {
    let range_str = range_str.trim();
    let spec = range_str.strip_prefix("bytes=")?;

    // Only support a single range (no multi-range).
    if spec.contains(',') {
        return None;
    }

    if let Some(suffix) = spec.strip_prefix('-') {
        let n: u64 = suffix.parse().ok()?;
        if n == 0 {
            return None;
        }
        Some(RequestRange::Suffix(n))
    } else if let Some(stripped) = spec.strip_suffix('-') {
        let start: u64 = stripped.parse().ok()?;
        Some(RequestRange::StartOpen(start))
    } else if let Some((start_s, end_s)) = spec.split_once('-') {
        let start: u64 = start_s.parse().ok()?;
        let end: u64 = end_s.parse().ok()?;
        if start > end {
            return None;
        }
        Some(RequestRange::StartEnd(start, end))
    } else {
        None
    }
}

/// Resolve a RequestRange against a total content length.
/// Returns (start, end) where both are inclusive, or None if unsatisfiable.
fn resolve_range(range: &RequestRange, total: u64) -> Option<(u64, u64)> {
    if total == 0 {
        return None;
    }
    match range {
        RequestRange::StartEnd(start, end) => {
            if *start >= total {
                return None;
            }
            Some((*start, std::cmp::min(*end, total - 1)))
        }
        RequestRange::StartOpen(start) => {
            if *start >= total {
                return None;
            }
            Some((*start, total - 1))
        }
        RequestRange::Suffix(n) => {
            if *n >= total {
                Some((0, total - 1))
            } else {
                Some((total - n, total - 1))
            }
        }
    }
}

// -- Middleware ---------------------------------------------------------------

/// Tower middleware that serves mounted filesystems.
///
/// Claims GET/HEAD requests whose path a mount claims; everything else
/// runs the inner service.  A claimed path that resolves to no object
/// also falls through, so application routes shadowed by a mount root
/// keep working.
pub async fn delivery_middleware(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    if req.method() != Method::GET && req.method() != Method::HEAD {
        return next.run(req).await;
    }

    let path = percent_encoding::percent_decode_str(req.uri().path())
        .decode_utf8_lossy()
        .into_owned();

    let Some(mount) = state.mounts.iter().find(|m| m.claims(&path)) else {
        return next.run(req).await;
    };

    let fs = match state.registry.get(&mount.name).await {
        Ok(fs) => fs,
        Err(e) => {
            warn!("mount {:?} has no usable filesystem: {e}", mount.name);
            return next.run(req).await;
        }
    };

    let relative = fs.get_relative_path(&path);
    if relative.is_empty() {
        return next.run(req).await;
    }

    let range = req
        .headers()
        .get(RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_range_header);

    let head_only = req.method() == Method::HEAD;
    match serve(&fs, &relative, range, head_only).await {
        Ok(response) => response,
        Err(FsError::NotFound { .. }) => {
            debug!("no object for {path}, falling through");
            next.run(req).await
        }
        Err(e) => e.into_response(),
    }
}

/// Serve one object, honoring an optional parsed range.
async fn serve(
    fs: &MediaFileSystem,
    relative: &str,
    range: Option<RequestRange>,
    head_only: bool,
) -> Result<Response, FsError> {
    let Some(range) = range else {
        let object = fs.fetch_object(relative, None).await?;
        let mut response = Response::new(if head_only {
            Body::empty()
        } else {
            Body::from_stream(object.body)
        });
        apply_object_headers(&mut response, &object.metadata, object.metadata.size);
        return Ok(response);
    };

    // Ranged request: the total size comes from a metadata probe, then
    // the store fetches only the requested slice.
    let metadata = fs.stat(relative).await?;
    let total = metadata.size;

    let Some((start, end)) = resolve_range(&range, total) else {
        let mut response = StatusCode::RANGE_NOT_SATISFIABLE.into_response();
        if let Ok(value) = HeaderValue::from_str(&format!("bytes */{total}")) {
            response.headers_mut().insert(CONTENT_RANGE, value);
        }
        return Ok(response);
    };

    let slice_len = end - start + 1;
    let object = fs
        .fetch_object(
            relative,
            Some(StoreRange {
                offset: start,
                length: slice_len,
            }),
        )
        .await?;

    let mut response = Response::new(if head_only {
        Body::empty()
    } else {
        Body::from_stream(object.body)
    });
    *response.status_mut() = StatusCode::PARTIAL_CONTENT;
    apply_object_headers(&mut response, &object.metadata, slice_len);
    if let Ok(value) = HeaderValue::from_str(&format!("bytes {start}-{end}/{total}")) {
        response.headers_mut().insert(CONTENT_RANGE, value);
    }
    Ok(response)
}

/// Set the standard delivery headers on a response.  `content_length`
/// is the body length on the wire, which differs from the object size
/// for ranged responses.
fn apply_object_headers(response: &mut Response, metadata: &ObjectMetadata, content_length: u64) {
    let headers = response.headers_mut();

    headers.insert(CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL_VALUE));
    headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    headers.insert(VARY, HeaderValue::from_static("Accept-Encoding"));
    headers.insert(CONTENT_LENGTH, HeaderValue::from(content_length));

    let last_modified = httpdate::fmt_http_date(metadata.last_modified);
    if let Ok(value) = HeaderValue::from_str(&last_modified) {
        headers.insert(LAST_MODIFIED, value);
    }
    if let Some(etag) = &metadata.etag {
        if let Ok(value) = HeaderValue::from_str(etag) {
            headers.insert(ETAG, value);
        }
    }
    if let Some(content_type) = &metadata.content_type {
        if let Ok(value) = HeaderValue::from_str(content_type) {
            headers.insert(CONTENT_TYPE, value);
        }
    }
}
