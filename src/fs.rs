//! The hierarchical filesystem contract over a flat object store.
//!
//! [`MediaFileSystem`] owns one configuration snapshot, one store client
//! and one path resolver.  Directory semantics are emulated: a directory
//! "exists" when at least one key lives under its prefix, listings group
//! deeper keys with the store delimiter, and directory deletion is a
//! paged listing followed by chunked batch deletes.
//!
//! Every store failure is translated at this boundary into an [`FsError`]
//! outcome; raw store errors never escape to callers.

use bytes::Bytes;
use futures::TryStreamExt;
use std::io::Cursor;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

use crate::config::FilesystemConfig;
use crate::errors::{FsError, FsResult, StoreError};
use crate::paths::PathResolver;
use crate::store::client::{ByteRange, ObjectBody, ObjectMetadata, ObjectStore};
use crate::store::paging;

/// Infer a content type from a file extension.
///
/// Covers the media and web asset types a CMS typically serves; unknown
/// extensions are uploaded without a content type.
pub fn content_type_for(path: &str) -> Option<&'static str> {
    let ext = path.rsplit_once('.')?.1.to_ascii_lowercase();
    let content_type = match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "wav" => "audio/wav",
        "pdf" => "application/pdf",
        "json" => "application/json",
        "js" => "text/javascript",
        "css" => "text/css",
        "html" | "htm" => "text/html",
        "txt" => "text/plain",
        "xml" => "text/xml",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "zip" => "application/zip",
        _ => return None,
    };
    Some(content_type)
}

/// A parsed `name*.ext` wildcard filter: at most one wildcard in the name
/// part and one in the extension part.
#[derive(Debug, PartialEq)]
struct FileFilter {
    /// Literal name portion, matched as a listing prefix.
    name_prefix: String,
    /// Literal extension (with dot), matched as a suffix.  Empty when
    /// the extension part was wildcarded.
    ext_suffix: String,
}

impl FileFilter {
    fn parse(filter: &str) -> Self {
        let (name_part, ext_part) = match filter.rfind('.') {
            Some(pos) => (&filter[..pos], &filter[pos..]),
            None => (filter, ""),
        };
        let name_prefix = name_part.strip_suffix('*').unwrap_or(name_part).to_string();
        let ext_suffix = if ext_part.contains('*') {
            String::new()
        } else {
            ext_part.to_string()
        };
        Self {
            name_prefix,
            ext_suffix,
        }
    }
}

/// One virtual filesystem instance: a configuration snapshot plus the
/// store client built from it.
///
/// Replaced wholesale by the registry when its configuration changes;
/// never mutated in place.
pub struct MediaFileSystem {
    name: String,
    config: Arc<FilesystemConfig>,
    store: Arc<dyn ObjectStore>,
    resolver: PathResolver,
}

impl std::fmt::Debug for MediaFileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaFileSystem")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

impl MediaFileSystem {
    /// Build an instance over an already-constructed store client.
    pub fn new(name: &str, config: Arc<FilesystemConfig>, store: Arc<dyn ObjectStore>) -> Self {
        let resolver = PathResolver::new(&config.key_prefix, &config.virtual_path);
        Self {
            name: name.to_string(),
            config,
            store,
            resolver,
        }
    }

    /// The registry name of this filesystem.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The configuration snapshot this instance was built from.
    pub fn config(&self) -> &FilesystemConfig {
        &self.config
    }

    /// The path resolver for this instance.
    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// Directory-prefix form of a logical path: always delimiter
    /// terminated, so the root of a prefixed filesystem lists under
    /// `prefix/` rather than matching sibling prefixes textually.
    fn directory_prefix(&self, path: &str) -> String {
        let key = self.resolver.to_object_key(path, true);
        if !key.is_empty() && !key.ends_with('/') {
            format!("{key}/")
        } else {
            key
        }
    }

    fn require_path<'a>(&self, path: &'a str, operation: &str) -> FsResult<&'a str> {
        if path.trim().is_empty() {
            return Err(FsError::invalid(format!(
                "{operation} requires a non-empty path"
            )));
        }
        Ok(path)
    }

    // -- Directory operations ------------------------------------------------

    /// List the immediate subdirectories of `path`.  Empty input means
    /// the filesystem root.
    pub async fn get_directories(&self, path: &str) -> FsResult<Vec<String>> {
        let prefix = self.directory_prefix(path);
        let mut directories = Vec::new();
        let mut pages = std::pin::pin!(paging::list_all(
            self.store.as_ref(),
            prefix,
            Some("/".to_string()),
        ));
        while let Some(page) = pages
            .try_next()
            .await
            .map_err(|e| FsError::from_store(e, path))?
        {
            directories.extend(
                page.common_prefixes
                    .iter()
                    .map(|p| self.resolver.from_object_key(p)),
            );
        }
        Ok(directories)
    }

    /// True iff at least one object exists under the directory prefix.
    /// A single-key probe, not a full listing.
    pub async fn directory_exists(&self, path: &str) -> FsResult<bool> {
        let prefix = self.directory_prefix(path);
        let page = self
            .store
            .list_objects(&prefix, None, None, Some(1))
            .await
            .map_err(|e| FsError::from_store(e, path))?;
        Ok(!page.keys.is_empty())
    }

    /// Delete every object under `path`.
    ///
    /// `recursive` is accepted for contract compatibility but deletion is
    /// always recursive: the store has no notion of direct children, only
    /// key prefixes.  Deletion is chunked and not atomic; a failed chunk
    /// leaves the directory partially deleted.
    pub async fn delete_directory(&self, path: &str, recursive: bool) -> FsResult<()> {
        if !recursive {
            debug!(
                "delete_directory({path}): recursive=false requested, deleting recursively anyway"
            );
        }
        let prefix = self.directory_prefix(path);
        let keys = paging::collect_keys(self.store.as_ref(), prefix, None)
            .await
            .map_err(|e| FsError::from_store(e, path))?;
        paging::delete_all(self.store.as_ref(), &keys)
            .await
            .map_err(|e| FsError::from_store(e, path))
    }

    // -- File operations -----------------------------------------------------

    /// Upload `content` to `path`, inferring the content type from the
    /// file extension and applying the configured ACL and encryption.
    ///
    /// Writes are always a full overwrite; `overwrite` is accepted for
    /// contract compatibility only.
    pub async fn add_file(&self, path: &str, content: Bytes, _overwrite: bool) -> FsResult<()> {
        self.require_path(path, "add_file")?;
        let key = self.resolver.to_object_key(path, false);
        let content_type = content_type_for(path);
        self.store
            .put_object(
                &key,
                content,
                content_type,
                &self.config.acl,
                self.config.server_side_encryption.as_deref(),
            )
            .await
            .map_err(|e| FsError::from_store(e, path))
    }

    /// Adding a file from a physical path is not supported by this
    /// filesystem; see [`Self::can_add_physical`].
    pub async fn add_file_from_path(&self, path: &str, _physical_path: &str) -> FsResult<()> {
        self.require_path(path, "add_file_from_path")?;
        Err(FsError::Unsupported {
            operation: "add file from a physical path".to_string(),
        })
    }

    /// Whether this filesystem can ingest files by physical path.
    pub fn can_add_physical(&self) -> bool {
        false
    }

    /// List files under `path`, optionally filtered by a `name*.ext`
    /// wildcard.  Entries with an empty resolved path are excluded.
    pub async fn get_files(&self, path: &str, filter: Option<&str>) -> FsResult<Vec<String>> {
        let dir = self.directory_prefix(path);
        let filter = filter.map(FileFilter::parse);

        let list_prefix = match &filter {
            Some(f) => format!("{dir}{}", f.name_prefix),
            None => dir,
        };

        let mut files = Vec::new();
        let mut pages = std::pin::pin!(paging::list_all(
            self.store.as_ref(),
            list_prefix,
            Some("/".to_string()),
        ));
        while let Some(page) = pages
            .try_next()
            .await
            .map_err(|e| FsError::from_store(e, path))?
        {
            for key in &page.keys {
                let relative = self.resolver.from_object_key(key);
                if relative.is_empty() {
                    continue;
                }
                if let Some(f) = &filter {
                    if !relative.ends_with(&f.ext_suffix) {
                        continue;
                    }
                }
                files.push(relative);
            }
        }
        Ok(files)
    }

    /// Fetch the object at `path` fully into memory, returning a
    /// buffered, seekable reader positioned at the start.
    ///
    /// The whole body is materialized before this returns; callers of
    /// the filesystem contract assume a seekable stream, so large assets
    /// cost their full size in memory here.  Delivery goes through
    /// [`Self::fetch_object`] instead, which does not buffer.
    pub async fn open_file(&self, path: &str) -> FsResult<Cursor<Bytes>> {
        let object = self.fetch_object(path, None).await?;
        let chunks: Vec<Bytes> = object
            .body
            .try_collect()
            .await
            .map_err(|e| FsError::from_store(e, path))?;
        Ok(Cursor::new(Bytes::from(chunks.concat())))
    }

    /// Streaming fetch used by the delivery middleware.  Resolves `path`
    /// with the same conventions as every other operation and returns the
    /// metadata plus a lazy body stream.
    pub async fn fetch_object(
        &self,
        path: &str,
        range: Option<ByteRange>,
    ) -> FsResult<ObjectBody> {
        self.require_path(path, "fetch_object")?;
        let key = self.resolver.to_object_key(path, false);
        self.store
            .get_object(&key, range)
            .await
            .map_err(|e| FsError::from_store(e, path))
    }

    /// Delete the file at `path`.  Deleting a missing file is not an
    /// error (store deletes are idempotent).
    pub async fn delete_file(&self, path: &str) -> FsResult<()> {
        self.require_path(path, "delete_file")?;
        let key = self.resolver.to_object_key(path, false);
        self.store
            .delete_object(&key)
            .await
            .map_err(|e| FsError::from_store(e, path))
    }

    /// Whether a file exists at `path`.  Absence is a valid outcome, not
    /// an error.
    pub async fn file_exists(&self, path: &str) -> FsResult<bool> {
        self.require_path(path, "file_exists")?;
        let key = self.resolver.to_object_key(path, false);
        match self.store.head_object(&key).await {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound) => Ok(false),
            Err(e) => Err(FsError::from_store(e, path)),
        }
    }

    /// Metadata of the file at `path` without fetching its content.
    pub async fn stat(&self, path: &str) -> FsResult<ObjectMetadata> {
        self.require_path(path, "stat")?;
        let key = self.resolver.to_object_key(path, false);
        self.store
            .head_object(&key)
            .await
            .map_err(|e| FsError::from_store(e, path))
    }

    /// Last modification time of the file at `path`.
    pub async fn get_last_modified(&self, path: &str) -> FsResult<SystemTime> {
        Ok(self.stat(path).await?.last_modified)
    }

    /// Creation time of the file at `path`.
    ///
    /// The store does not track creation separately, so this is an alias
    /// of [`Self::get_last_modified`].
    pub async fn get_created(&self, path: &str) -> FsResult<SystemTime> {
        self.get_last_modified(path).await
    }

    /// Size in bytes of the file at `path`.
    pub async fn get_size(&self, path: &str) -> FsResult<u64> {
        Ok(self.stat(path).await?.size)
    }

    // -- Path mapping --------------------------------------------------------

    /// Map a full path or URL to a path relative to the mount root.
    pub fn get_relative_path(&self, full_path_or_url: &str) -> String {
        self.resolver.to_relative_path(full_path_or_url)
    }

    /// Map a logical path to the public full path under the mount root.
    pub fn get_full_path(&self, path: &str) -> String {
        self.resolver.to_full_path(path)
    }

    /// Compose the public URL for a logical path.
    pub fn get_url(&self, path: &str) -> String {
        self.resolver.url(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn test_config() -> Arc<FilesystemConfig> {
        Arc::new(FilesystemConfig {
            backend: "memory".to_string(),
            key_prefix: "media".to_string(),
            virtual_path: "/media".to_string(),
            ..FilesystemConfig::default()
        })
    }

    fn filesystem() -> (Arc<MemoryStore>, MediaFileSystem) {
        let store = Arc::new(MemoryStore::new());
        let fs = MediaFileSystem::new("media", test_config(), store.clone());
        (store, fs)
    }

    #[test]
    fn test_filter_parse() {
        assert_eq!(
            FileFilter::parse("img*.jpg"),
            FileFilter {
                name_prefix: "img".into(),
                ext_suffix: ".jpg".into()
            }
        );
        assert_eq!(
            FileFilter::parse("img*.*"),
            FileFilter {
                name_prefix: "img".into(),
                ext_suffix: String::new()
            }
        );
        assert_eq!(
            FileFilter::parse("logo.svg"),
            FileFilter {
                name_prefix: "logo".into(),
                ext_suffix: ".svg".into()
            }
        );
    }

    #[test]
    fn test_content_type_lookup() {
        assert_eq!(content_type_for("a/b.JPG"), Some("image/jpeg"));
        assert_eq!(content_type_for("x.svg"), Some("image/svg+xml"));
        assert_eq!(content_type_for("noext"), None);
        assert_eq!(content_type_for("weird.xyz"), None);
    }

    #[tokio::test]
    async fn test_directory_lifecycle() {
        let (_, fs) = filesystem();

        assert!(!fs.directory_exists("").await.unwrap());

        fs.add_file("a/b.txt", Bytes::from_static(b"hi"), true)
            .await
            .unwrap();

        assert!(fs.directory_exists("").await.unwrap());
        assert!(fs.directory_exists("a").await.unwrap());
        assert!(!fs.directory_exists("b").await.unwrap());
        assert_eq!(fs.get_directories("").await.unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_get_directories_nested() {
        let (_, fs) = filesystem();
        for path in ["x/1.jpg", "y/2.jpg", "y/sub/3.jpg", "root.txt"] {
            fs.add_file(path, Bytes::from_static(b"d"), true)
                .await
                .unwrap();
        }

        assert_eq!(fs.get_directories("").await.unwrap(), vec!["x", "y"]);
        assert_eq!(fs.get_directories("y").await.unwrap(), vec!["y/sub"]);
    }

    #[tokio::test]
    async fn test_get_files_with_wildcard_filter() {
        let (_, fs) = filesystem();
        for path in ["img.jpg", "img-thumb.png", "logo.svg"] {
            fs.add_file(path, Bytes::from_static(b"d"), true)
                .await
                .unwrap();
        }

        let files = fs.get_files("", Some("img*.jpg")).await.unwrap();
        assert_eq!(files, vec!["img.jpg"]);

        let all = fs.get_files("", None).await.unwrap();
        assert_eq!(all, vec!["img-thumb.png", "img.jpg", "logo.svg"]);
    }

    #[tokio::test]
    async fn test_add_file_applies_content_type_and_acl() {
        let (store, fs) = filesystem();
        fs.add_file("pic.jpg", Bytes::from_static(b"jpeg"), true)
            .await
            .unwrap();

        let meta = store.head_object("media/pic.jpg").await.unwrap();
        assert_eq!(meta.content_type.as_deref(), Some("image/jpeg"));
        assert_eq!(store.acl_of("media/pic.jpg").await.as_deref(), Some("public-read"));
        assert_eq!(store.sse_of("media/pic.jpg").await, None);
    }

    #[tokio::test]
    async fn test_add_file_from_path_is_unsupported() {
        let (_, fs) = filesystem();
        assert!(!fs.can_add_physical());
        let err = fs.add_file_from_path("a.txt", "/tmp/a.txt").await.unwrap_err();
        assert!(matches!(err, FsError::Unsupported { .. }));
    }

    #[tokio::test]
    async fn test_blank_path_fails_fast() {
        let (_, fs) = filesystem();
        let err = fs.open_file("  ").await.unwrap_err();
        assert!(matches!(err, FsError::InvalidArgument { .. }));
        let err = fs
            .add_file("", Bytes::from_static(b"x"), true)
            .await
            .unwrap_err();
        assert!(matches!(err, FsError::InvalidArgument { .. }));
    }

    #[tokio::test]
    async fn test_open_file_returns_seekable_buffer() {
        let (_, fs) = filesystem();
        fs.add_file("a.txt", Bytes::from_static(b"hello world"), true)
            .await
            .unwrap();

        let mut cursor = fs.open_file("a.txt").await.unwrap();
        assert_eq!(cursor.position(), 0);
        assert_eq!(cursor.get_ref().as_ref(), b"hello world");

        use std::io::{Read, Seek, SeekFrom};
        cursor.seek(SeekFrom::Start(6)).unwrap();
        let mut rest = String::new();
        cursor.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "world");
    }

    #[tokio::test]
    async fn test_missing_file_surfaces_per_contract() {
        let (_, fs) = filesystem();

        // Existence probes report absence as a value.
        assert!(!fs.file_exists("nope.jpg").await.unwrap());

        // Content fetches report absence as an error.
        let err = fs.open_file("nope.jpg").await.unwrap_err();
        assert!(matches!(err, FsError::NotFound { .. }));
        let err = fs.get_size("nope.jpg").await.unwrap_err();
        assert!(matches!(err, FsError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_directory_removes_everything_under_prefix() {
        let (store, fs) = filesystem();
        for i in 0..5 {
            fs.add_file(&format!("gone/{i}.txt"), Bytes::from_static(b"x"), true)
                .await
                .unwrap();
        }
        fs.add_file("kept.txt", Bytes::from_static(b"x"), true)
            .await
            .unwrap();

        fs.delete_directory("gone", true).await.unwrap();

        assert!(!fs.directory_exists("gone").await.unwrap());
        assert!(fs.file_exists("kept.txt").await.unwrap());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_delete_directory_ignores_recursive_flag() {
        let (_, fs) = filesystem();
        fs.add_file("d/sub/deep.txt", Bytes::from_static(b"x"), true)
            .await
            .unwrap();

        // recursive=false still deletes the whole subtree.
        fs.delete_directory("d", false).await.unwrap();
        assert!(!fs.directory_exists("d").await.unwrap());
    }

    #[tokio::test]
    async fn test_metadata_operations() {
        let (_, fs) = filesystem();
        fs.add_file("m.txt", Bytes::from_static(b"12345"), true)
            .await
            .unwrap();

        assert_eq!(fs.get_size("m.txt").await.unwrap(), 5);
        let modified = fs.get_last_modified("m.txt").await.unwrap();
        let created = fs.get_created("m.txt").await.unwrap();
        assert_eq!(modified, created);
    }

    #[tokio::test]
    async fn test_path_mapping_helpers() {
        let (_, fs) = filesystem();
        assert_eq!(fs.get_relative_path("/media/1/a.jpg"), "1/a.jpg");
        assert_eq!(fs.get_full_path("1/a.jpg"), "media/1/a.jpg");
        assert_eq!(fs.get_url("1/a.jpg"), "/media/1/a.jpg");
    }
}
