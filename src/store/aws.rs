//! AWS S3 object-store client.
//!
//! Implements [`ObjectStore`] against a real S3-compatible bucket.  Keys
//! arrive fully qualified (the path resolver owns prefixing), so this
//! module is a thin translation between the trait contract and the SDK.
//!
//! Credentials come from the configuration block when set, otherwise the
//! standard AWS credential chain (env vars, `~/.aws/credentials`, IAM
//! role, etc.).

use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::Client;
use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;
use std::time::SystemTime;
use tracing::{debug, info};

use super::client::{
    ByteRange, ListingPage, ObjectBody, ObjectMetadata, ObjectStore, MAX_DELETE_BATCH,
};
use crate::config::FilesystemConfig;
use crate::errors::StoreError;

/// [`ObjectStore`] backed by an S3-compatible bucket.
pub struct AwsObjectStore {
    /// AWS S3 SDK client.
    client: Client,
    /// The bucket name all keys live in.
    bucket: String,
}

impl AwsObjectStore {
    /// Create a client from a filesystem configuration snapshot.
    pub async fn new(config: &FilesystemConfig) -> anyhow::Result<Self> {
        let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()));

        if !config.endpoint_url.is_empty() {
            config_loader = config_loader.endpoint_url(&config.endpoint_url);
        }

        // Explicit credentials from config override the default chain.
        if !config.access_key_id.is_empty() && !config.secret_access_key.is_empty() {
            let creds = aws_sdk_s3::config::Credentials::new(
                &config.access_key_id,
                &config.secret_access_key,
                None, // session_token
                None, // expiry
                "mediafs-config",
            );
            config_loader = config_loader.credentials_provider(creds);
        }

        let sdk_config = config_loader.load().await;

        let s3_config_builder =
            aws_sdk_s3::config::Builder::from(&sdk_config).force_path_style(config.use_path_style);

        let client = Client::from_conf(s3_config_builder.build());

        info!(
            "S3 store client initialized: bucket={} region={}",
            config.bucket, config.region
        );

        Ok(Self {
            client,
            bucket: config.bucket.clone(),
        })
    }

    /// Map an SDK service error to a [`StoreError`] by error code.
    fn map_service_error<E>(context: &str, err: E) -> StoreError
    where
        E: ProvideErrorMetadata + std::fmt::Display,
    {
        let detail = err
            .message()
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string());
        match err.code() {
            Some("NoSuchKey") | Some("NotFound") => StoreError::NotFound,
            Some("AccessDenied") | Some("InvalidAccessKeyId") | Some("SignatureDoesNotMatch") => {
                StoreError::AccessDenied(format!("{context}: {detail}"))
            }
            _ => StoreError::Other(format!("{context}: {detail}")),
        }
    }

    /// Format a byte range as an HTTP `Range` request header value.
    fn format_range(range: ByteRange) -> String {
        format!("bytes={}-{}", range.offset, range.last())
    }

    /// Extract the total object size from a `Content-Range` value like
    /// `bytes 2-5/10`.
    fn parse_content_range_total(value: &str) -> Option<u64> {
        value.rsplit_once('/')?.1.parse().ok()
    }

    fn to_system_time(dt: Option<&aws_smithy_types::DateTime>) -> SystemTime {
        dt.and_then(|dt| SystemTime::try_from(*dt).ok())
            .unwrap_or(SystemTime::UNIX_EPOCH)
    }
}

impl ObjectStore for AwsObjectStore {
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
            debug!("S3 list_objects: bucket={} prefix={}", self.bucket, prefix);

            let resp = self
                .client
                .list_objects()
                .bucket(&self.bucket)
                .prefix(&prefix)
                .set_delimiter(delimiter)
                .set_marker(marker)
                .set_max_keys(max_keys)
                .send()
                .await
                .map_err(|e| Self::map_service_error("list_objects", e.into_service_error()))?;

            let keys: Vec<String> = resp
                .contents()
                .iter()
                .filter_map(|obj| obj.key().map(str::to_string))
                .collect();

            let common_prefixes: Vec<String> = resp
                .common_prefixes()
                .iter()
                .filter_map(|cp| cp.prefix().map(str::to_string))
                .collect();

            let is_truncated = resp.is_truncated().unwrap_or(false);
            // The marker-style listing only returns NextMarker when a
            // delimiter was supplied; otherwise resume from the last key.
            let next_marker = resp
                .next_marker()
                .map(str::to_string)
                .or_else(|| if is_truncated { keys.last().cloned() } else { None });

            Ok(ListingPage {
                keys,
                common_prefixes,
                next_marker,
                is_truncated,
            })
        })
    }

    fn get_object(
        &self,
        key: &str,
        range: Option<ByteRange>,
    ) -> Pin<Box<dyn Future<Output = Result<ObjectBody, StoreError>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            debug!("S3 get_object: bucket={} key={}", self.bucket, key);

            let resp = self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(&key)
                .set_range(range.map(Self::format_range))
                .send()
                .await
                .map_err(|e| {
                    let service_err = e.into_service_error();
                    if service_err.is_no_such_key() {
                        StoreError::NotFound
                    } else {
                        Self::map_service_error("get_object", service_err)
                    }
                })?;

            // For ranged responses Content-Length covers the slice; the
            // total object size lives in Content-Range.
            let size = resp
                .content_range()
                .and_then(Self::parse_content_range_total)
                .or_else(|| resp.content_length().map(|l| l.max(0) as u64))
                .unwrap_or(0);

            let metadata = ObjectMetadata {
                size,
                last_modified: Self::to_system_time(resp.last_modified()),
                content_type: resp.content_type().map(str::to_string),
                etag: resp.e_tag().map(str::to_string),
            };

            let body = futures::stream::try_unfold(resp.body, |mut body| async move {
                match body.try_next().await {
                    Ok(Some(chunk)) => Ok(Some((chunk, body))),
                    Ok(None) => Ok(None),
                    Err(e) => Err(StoreError::Other(format!("get_object body: {e}"))),
                }
            });

            Ok(ObjectBody {
                metadata,
                body: Box::pin(body),
            })
        })
    }

    fn head_object(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<ObjectMetadata, StoreError>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            debug!("S3 head_object: bucket={} key={}", self.bucket, key);

            let resp = self
                .client
                .head_object()
                .bucket(&self.bucket)
                .key(&key)
                .send()
                .await
                .map_err(|e| {
                    let service_err = e.into_service_error();
                    if service_err.is_not_found() {
                        StoreError::NotFound
                    } else {
                        Self::map_service_error("head_object", service_err)
                    }
                })?;

            Ok(ObjectMetadata {
                size: resp.content_length().map(|l| l.max(0) as u64).unwrap_or(0),
                last_modified: Self::to_system_time(resp.last_modified()),
                content_type: resp.content_type().map(str::to_string),
                etag: resp.e_tag().map(str::to_string),
            })
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
        let acl = aws_sdk_s3::types::ObjectCannedAcl::from(acl);
        let sse = server_side_encryption.map(aws_sdk_s3::types::ServerSideEncryption::from);
        Box::pin(async move {
            debug!("S3 put_object: bucket={} key={}", self.bucket, key);

            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(&key)
                .body(aws_sdk_s3::primitives::ByteStream::from(data))
                .set_content_type(content_type)
                .acl(acl)
                .set_server_side_encryption(sse)
                .send()
                .await
                .map_err(|e| Self::map_service_error("put_object", e.into_service_error()))?;

            Ok(())
        })
    }

    fn delete_object(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            debug!("S3 delete_object: bucket={} key={}", self.bucket, key);

            // S3 delete_object is idempotent -- no error for missing keys.
            self.client
                .delete_object()
                .bucket(&self.bucket)
                .key(&key)
                .send()
                .await
                .map_err(|e| Self::map_service_error("delete_object", e.into_service_error()))?;

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
            if keys.is_empty() {
                return Ok(());
            }

            debug!(
                "S3 delete_objects: bucket={} count={}",
                self.bucket,
                keys.len()
            );

            let objects: Vec<aws_sdk_s3::types::ObjectIdentifier> = keys
                .iter()
                .map(|k| {
                    aws_sdk_s3::types::ObjectIdentifier::builder()
                        .key(k)
                        .build()
                        .map_err(|e| StoreError::Other(format!("delete_objects build: {e}")))
                })
                .collect::<Result<_, _>>()?;

            let delete = aws_sdk_s3::types::Delete::builder()
                .set_objects(Some(objects))
                .quiet(true)
                .build()
                .map_err(|e| StoreError::Other(format!("delete_objects build: {e}")))?;

            self.client
                .delete_objects()
                .bucket(&self.bucket)
                .delete(delete)
                .send()
                .await
                .map_err(|e| Self::map_service_error("delete_objects", e.into_service_error()))?;

            Ok(())
        })
    }
}
