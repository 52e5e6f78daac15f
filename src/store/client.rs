//! Abstract object-store client contract.
//!
//! Every backend must implement [`ObjectStore`].  The trait is the opaque
//! seam over the wire protocol: get/put/list/delete/head keyed by object
//! key, each failing with a distinguishable [`StoreError`] outcome.
//! Bodies are returned as lazy byte streams so delivery can forward them
//! without materializing the whole object.

use bytes::Bytes;
use futures::stream::Stream;
use std::future::Future;
use std::pin::Pin;
use std::time::SystemTime;

use crate::errors::StoreError;

/// Maximum number of keys the store accepts in one batch-delete call.
pub const MAX_DELETE_BATCH: usize = 100;

/// Metadata for a stored object.
///
/// The store does not track a creation time distinct from last-modified;
/// the filesystem contract exposes "created" as an alias of it.
#[derive(Debug, Clone)]
pub struct ObjectMetadata {
    /// Object size in bytes.
    pub size: u64,
    /// Last modification time.
    pub last_modified: SystemTime,
    /// Content type recorded at write time, if any.
    pub content_type: Option<String>,
    /// Entity tag, quoted per HTTP convention.
    pub etag: Option<String>,
}

/// One page of a listing response.
///
/// `common_prefixes` holds the emulated subdirectories when a delimiter
/// was supplied.  Order is server-defined, not guaranteed lexicographic.
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    /// Object keys in this page.
    pub keys: Vec<String>,
    /// Key prefixes grouped by the delimiter.
    pub common_prefixes: Vec<String>,
    /// Opaque marker to pass to the next listing call.
    pub next_marker: Option<String>,
    /// Whether more results are pending.
    pub is_truncated: bool,
}

/// A byte range within an object: `offset` plus `length` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub offset: u64,
    pub length: u64,
}

impl ByteRange {
    /// Inclusive last byte position, for `Content-Range` headers.
    pub fn last(&self) -> u64 {
        self.offset + self.length - 1
    }
}

/// Lazy object body: a stream of byte chunks.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, StoreError>> + Send>>;

/// A fetched object: metadata plus its (possibly ranged) body stream.
pub struct ObjectBody {
    /// Full-object metadata.  `size` is always the total object size,
    /// even when the body is a range.
    pub metadata: ObjectMetadata,
    /// The body bytes.  Dropping the stream cancels the transfer.
    pub body: BodyStream,
}

/// Async object-store contract.
pub trait ObjectStore: Send + Sync + 'static {
    /// List objects under `prefix`, optionally grouping by `delimiter`,
    /// resuming from `marker`.  `max_keys` caps the page size.
    fn list_objects(
        &self,
        prefix: &str,
        delimiter: Option<&str>,
        marker: Option<&str>,
        max_keys: Option<i32>,
    ) -> Pin<Box<dyn Future<Output = Result<ListingPage, StoreError>> + Send + '_>>;

    /// Fetch an object's metadata and body.  When `range` is given only
    /// that slice is transferred; metadata still describes the whole
    /// object.
    fn get_object(
        &self,
        key: &str,
        range: Option<ByteRange>,
    ) -> Pin<Box<dyn Future<Output = Result<ObjectBody, StoreError>> + Send + '_>>;

    /// Fetch metadata without the body.
    fn head_object(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<ObjectMetadata, StoreError>> + Send + '_>>;

    /// Write `data` to `key` with the given content type, canned ACL and
    /// optional server-side encryption algorithm.  Always a full
    /// overwrite.
    fn put_object(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
        acl: &str,
        server_side_encryption: Option<&str>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;

    /// Delete a single object.  Idempotent: deleting a missing key is
    /// not an error.
    fn delete_object(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;

    /// Delete up to [`MAX_DELETE_BATCH`] objects in one call.
    fn delete_objects(
        &self,
        keys: &[String],
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;
}
