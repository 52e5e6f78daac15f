//! Pagination and batch-delete helpers over an [`ObjectStore`].
//!
//! [`list_all`] follows continuation markers until the store reports no
//! more results, yielding each page as produced.  The stream is lazy and
//! forward-only: it is safe to re-run the whole listing from scratch, but
//! a partially-consumed stream cannot be resumed because the underlying
//! protocol guarantees no stable snapshot across calls.

use futures::stream::{self, Stream, TryStreamExt};

use super::client::{ListingPage, ObjectStore, MAX_DELETE_BATCH};
use crate::errors::StoreError;

enum PageState {
    Start,
    Continue(String),
    Done,
}

/// Lazily list every page under `prefix`, chaining continuation markers.
pub fn list_all<'a>(
    store: &'a dyn ObjectStore,
    prefix: String,
    delimiter: Option<String>,
) -> impl Stream<Item = Result<ListingPage, StoreError>> + 'a {
    stream::try_unfold(PageState::Start, move |state| {
        let prefix = prefix.clone();
        let delimiter = delimiter.clone();
        async move {
            let marker = match state {
                PageState::Start => None,
                PageState::Continue(marker) => Some(marker),
                PageState::Done => return Ok(None),
            };

            let page = store
                .list_objects(&prefix, delimiter.as_deref(), marker.as_deref(), None)
                .await?;

            let next = match (page.is_truncated, page.next_marker.clone()) {
                (true, Some(marker)) => PageState::Continue(marker),
                // Truncated but no marker: nothing to resume from, stop.
                _ => PageState::Done,
            };

            Ok(Some((page, next)))
        }
    })
}

/// Collect every object key under `prefix` across all pages.
pub async fn collect_keys(
    store: &dyn ObjectStore,
    prefix: String,
    delimiter: Option<String>,
) -> Result<Vec<String>, StoreError> {
    let mut keys = Vec::new();
    let mut pages = std::pin::pin!(list_all(store, prefix, delimiter));
    while let Some(page) = pages.try_next().await? {
        keys.extend(page.keys);
    }
    Ok(keys)
}

/// Delete `keys` in positional chunks of at most [`MAX_DELETE_BATCH`],
/// issuing one batch call per chunk, sequentially.
///
/// Fail-fast: a failed chunk's error propagates immediately and keys in
/// earlier chunks stay deleted.  Deletion is not atomic across chunks;
/// callers needing full deletion must retry the whole operation and
/// treat "already deleted" as success.
pub async fn delete_all(store: &dyn ObjectStore, keys: &[String]) -> Result<(), StoreError> {
    for chunk in keys.chunks(MAX_DELETE_BATCH) {
        store.delete_objects(chunk).await?;
    }
    Ok(())
}
