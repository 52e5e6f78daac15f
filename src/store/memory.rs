//! In-memory object store.
//!
//! Objects are held in a `tokio::sync::RwLock<BTreeMap<...>>` so listings
//! come back in key order.  Emulates the wire-level listing contract of a
//! real store: prefix filtering, delimiter grouping into common prefixes,
//! and marker-based pagination with a configurable page size.  Used by
//! the test suite and selectable via `backend: memory` for local
//! development.

use bytes::Bytes;
use futures::stream;
use md5::{Digest, Md5};
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::time::SystemTime;

use super::client::{
    ByteRange, ListingPage, ObjectBody, ObjectMetadata, ObjectStore, MAX_DELETE_BATCH,
};
use crate::errors::StoreError;

#[derive(Debug, Clone)]
struct Entry {
    data: Bytes,
    content_type: Option<String>,
    last_modified: SystemTime,
    etag: String,
    acl: String,
    server_side_encryption: Option<String>,
}

/// In-memory [`ObjectStore`] implementation.
pub struct MemoryStore {
    objects: tokio::sync::RwLock<BTreeMap<String, Entry>>,
    /// Maximum number of entries (keys + common prefixes) per listing page.
    page_size: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store with the store-typical page size of 1000.
    pub fn new() -> Self {
        Self::with_page_size(1000)
    }

    /// Create an empty store with a custom listing page size.  Small
    /// sizes force pagination, which is what the tests want.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            objects: tokio::sync::RwLock::new(BTreeMap::new()),
            page_size,
        }
    }

    /// Compute the quoted MD5-hex ETag for a byte slice.
    fn compute_etag(data: &[u8]) -> String {
        let mut hasher = Md5::new();
        hasher.update(data);
        format!("\"{}\"", hex::encode(hasher.finalize()))
    }

    /// The ACL recorded for `key` at write time, if the key exists.
    pub async fn acl_of(&self, key: &str) -> Option<String> {
        self.objects.read().await.get(key).map(|e| e.acl.clone())
    }

    /// The SSE algorithm recorded for `key` at write time, if any.
    pub async fn sse_of(&self, key: &str) -> Option<String> {
        self.objects
            .read()
            .await
            .get(key)
            .and_then(|e| e.server_side_encryption.clone())
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Whether the store holds no objects.
    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    fn metadata_of(entry: &Entry) -> ObjectMetadata {
        ObjectMetadata {
            size: entry.data.len() as u64,
            last_modified: entry.last_modified,
            content_type: entry.content_type.clone(),
            etag: Some(entry.etag.clone()),
        }
    }
}

/// A listing item in key order: either a plain key or a delimiter group.
#[derive(Debug, PartialEq)]
enum ListItem {
    Key(String),
    CommonPrefix(String),
}

impl ListItem {
    fn as_str(&self) -> &str {
        match self {
            ListItem::Key(s) | ListItem::CommonPrefix(s) => s,
        }
    }
}

impl ObjectStore for MemoryStore {
    fn list_objects(
        &self,
        prefix: &str,
        delimiter: Option<&str>,
        marker: Option<&str>,
        max_keys: Option<i32>,
    ) -> Pin<Box<dyn Future<Output = Result<ListingPage, StoreError>> + Send + '_>> {
        let prefix = prefix.to_string();
        let delimiter = delimiter.map(|s| s.to_string());
        let marker = marker.map(|s| s.to_string());
        Box::pin(async move {
            let objects = self.objects.read().await;

            // Merge keys and delimiter groups into one ordered item list,
            // then cut the page.  BTreeMap iteration is already sorted.
            let mut items: Vec<ListItem> = Vec::new();
            for key in objects.keys() {
                if !key.starts_with(&prefix) {
                    continue;
                }
                if let Some(m) = &marker {
                    if key.as_str() <= m.as_str() {
                        continue;
                    }
                }
                if let Some(d) = &delimiter {
                    let rest = &key[prefix.len()..];
                    if let Some(pos) = rest.find(d.as_str()) {
                        let group = key[..prefix.len() + pos + d.len()].to_string();
                        if marker.as_deref().is_some_and(|m| group.as_str() <= m) {
                            continue;
                        }
                        if items.last() != Some(&ListItem::CommonPrefix(group.clone())) {
                            items.push(ListItem::CommonPrefix(group));
                        }
                        continue;
                    }
                }
                items.push(ListItem::Key(key.clone()));
            }

            let limit = max_keys
                .map(|n| n.max(0) as usize)
                .unwrap_or(self.page_size)
                .min(self.page_size);
            let is_truncated = items.len() > limit;
            items.truncate(limit);

            let next_marker = if is_truncated {
                items.last().map(|i| i.as_str().to_string())
            } else {
                None
            };

            let mut page = ListingPage {
                next_marker,
                is_truncated,
                ..Default::default()
            };
            for item in items {
                match item {
                    ListItem::Key(k) => page.keys.push(k),
                    ListItem::CommonPrefix(p) => page.common_prefixes.push(p),
                }
            }
            Ok(page)
        })
    }

    fn get_object(
        &self,
        key: &str,
        range: Option<ByteRange>,
    ) -> Pin<Box<dyn Future<Output = Result<ObjectBody, StoreError>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let objects = self.objects.read().await;
            let entry = objects.get(&key).ok_or(StoreError::NotFound)?;
            let metadata = Self::metadata_of(entry);

            let data = match range {
                Some(r) => {
                    let start = (r.offset as usize).min(entry.data.len());
                    let end = ((r.offset + r.length) as usize).min(entry.data.len());
                    entry.data.slice(start..end)
                }
                None => entry.data.clone(),
            };

            Ok(ObjectBody {
                metadata,
                body: Box::pin(stream::once(async move { Ok(data) })),
            })
        })
    }

    fn head_object(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<ObjectMetadata, StoreError>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let objects = self.objects.read().await;
            objects
                .get(&key)
                .map(Self::metadata_of)
                .ok_or(StoreError::NotFound)
        })
    }

    fn put_object(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
        acl: &str,
        server_side_encryption: Option<&str>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        let key = key.to_string();
        let content_type = content_type.map(|s| s.to_string());
        let acl = acl.to_string();
        let sse = server_side_encryption.map(|s| s.to_string());
        Box::pin(async move {
            let etag = Self::compute_etag(&data);
            let entry = Entry {
                data,
                content_type,
                last_modified: SystemTime::now(),
                etag,
                acl,
                server_side_encryption: sse,
            };
            self.objects.write().await.insert(key, entry);
            Ok(())
        })
    }

    fn delete_object(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            self.objects.write().await.remove(&key);
            Ok(())
        })
    }

    fn delete_objects(
        &self,
        keys: &[String],
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        let keys = keys.to_vec();
        Box::pin(async move {
            if keys.len() > MAX_DELETE_BATCH {
                return Err(StoreError::Other(format!(
                    "delete batch of {} exceeds the {MAX_DELETE_BATCH}-key cap",
                    keys.len()
                )));
            }
            let mut objects = self.objects.write().await;
            for key in &keys {
                objects.remove(key);
            }
            Ok(())
        })
    }
}
