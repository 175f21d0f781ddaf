// ai
//! 🪣📡 S3 Store: listing and streaming split files straight out of a bucket.
//!
//! INT. AWS CONSOLE. NIGHT. A bucket in us-west-2, bloated with a decade of
//! split files. Someone typed `PUT` once and walked away. The data has been waiting.
//!
//! 🧠 Knowledge graph:
//! - Listing: `ListObjectsV2` paged with continuation tokens; directory markers skipped.
//!   A failed page yields one error entry and ends the listing (no token, no next page).
//! - Content: `GetObject` → `ByteStream::next()` chunk by chunk. Nothing is buffered whole.
//! - `NoSuchKey` surfaces from `open`, before a single byte is streamed.
//! - Credentials are resolved once in `new`. No usable credentials means the run never starts.
//! - Region, endpoint override, static credentials, connect/read timeouts and retry
//!   attempts all go to the SDK. The pipeline itself never imposes a timeout.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_stream::stream;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{Credentials, ProvideCredentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::operation::get_object::GetObjectError;
use futures::stream::BoxStream;
use tracing::debug;

use super::{ByteChunks, ContentSource, ListingSource};
use crate::app_config::SourceConfig;
use crate::common::{ListEntry, ObjectId};

/// 🪣 A configured S3 client plus the bucket it points at. Cheap to clone.
#[derive(Clone)]
pub struct S3Store {
    client: aws_sdk_s3::Client,
    bucket: String,
}

// 🐛 Debug skips the client; nobody debugging a listing wants to see the SDK's innards.
impl std::fmt::Debug for S3Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Store")
            .field("bucket", &self.bucket)
            .finish()
    }
}

impl S3Store {
    /// 🚀 Build the SDK client from config.
    ///
    /// Credentials: static pair from config if given, otherwise the usual chain
    /// (env vars → ~/.aws/config → IAM role → hope).
    pub async fn new(source_config: &SourceConfig) -> Result<Self> {
        let the_bucket = source_config
            .bucket
            .clone()
            .ok_or_else(|| anyhow!("💀 S3Store needs a bucket, and source.bucket is not set"))?;

        let the_timeouts = TimeoutConfig::builder()
            .connect_timeout(Duration::from_secs(source_config.connect_timeout_secs))
            .read_timeout(Duration::from_secs(source_config.read_timeout_secs))
            .build();
        // -- 🔄 `retries` counts retries; the SDK counts attempts. Off-by-one, avoided.
        let the_retries =
            RetryConfig::standard().with_max_attempts(source_config.retries.saturating_add(1));

        let mut the_loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(source_config.region.clone()))
            .timeout_config(the_timeouts)
            .retry_config(the_retries);

        if let (Some(key_id), Some(secret)) = (
            &source_config.access_key_id,
            &source_config.secret_access_key,
        ) {
            the_loader = the_loader.credentials_provider(Credentials::new(
                key_id.clone(),
                secret.clone(),
                None,
                None,
                "splitfeed-config",
            ));
        }

        let the_sdk_config = the_loader.load().await;
        resolve_credentials(&the_sdk_config).await?;
        let mut the_builder = aws_sdk_s3::config::Builder::from(&the_sdk_config);
        if let Some(endpoint) = &source_config.endpoint_url {
            // -- 🧪 MinIO and LocalStack want path-style. They always want path-style.
            the_builder = the_builder.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Self {
            client: aws_sdk_s3::Client::from_conf(the_builder.build()),
            bucket: the_bucket,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

/// 🔑 Ask the provider chain for credentials now, so a missing or broken chain fails
/// startup instead of the first `ListObjectsV2`.
async fn resolve_credentials(sdk_config: &SdkConfig) -> Result<()> {
    let the_provider = sdk_config
        .credentials_provider()
        .ok_or_else(|| anyhow!("💀 no AWS credentials provider is configured"))?;
    the_provider.provide_credentials().await.context(
        "💀 couldn't resolve AWS credentials. Set source.access_key_id and \
         source.secret_access_key, or give the default chain something to find.",
    )?;
    debug!("🔑 AWS credentials resolved");
    Ok(())
}

impl ListingSource for S3Store {
    fn list<'a>(&'a self, prefix: &'a str) -> BoxStream<'a, ListEntry> {
        Box::pin(stream! {
            let mut the_continuation_token: Option<String> = None;
            loop {
                let mut the_request = self.client.list_objects_v2().bucket(&self.bucket);
                if !prefix.is_empty() {
                    the_request = the_request.prefix(prefix);
                }
                if let Some(token) = &the_continuation_token {
                    the_request = the_request.continuation_token(token);
                }

                let the_page = match the_request.send().await {
                    Ok(page) => page,
                    Err(e) => {
                        yield Err(anyhow!(
                            "💀 ListObjectsV2 failed for s3://{}/{}: {}",
                            self.bucket,
                            prefix,
                            DisplayErrorContext(&e)
                        ));
                        break;
                    }
                };

                debug!("📜 listed a page of {} objects under s3://{}/{}", the_page.contents().len(), self.bucket, prefix);
                for object in the_page.contents() {
                    let Some(key) = object.key() else { continue };
                    // -- 📁 directory markers are not split files, no matter how hard they try
                    if key.is_empty() || key.ends_with('/') {
                        continue;
                    }
                    yield Ok(ObjectId {
                        key: key.to_string(),
                        size: object.size().map(|s| s.max(0) as u64),
                    });
                }

                if the_page.is_truncated() == Some(true) {
                    the_continuation_token = the_page.next_continuation_token().map(str::to_string);
                    if the_continuation_token.is_none() {
                        break;
                    }
                } else {
                    break;
                }
            }
        })
    }
}

#[async_trait]
impl ContentSource for S3Store {
    async fn open(&self, key: &str) -> Result<ByteChunks> {
        let the_response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| match e.as_service_error() {
                Some(GetObjectError::NoSuchKey(_)) => {
                    anyhow!("💀 s3://{}/{} does not exist", self.bucket, key)
                }
                _ => anyhow!(
                    "💀 GetObject failed for s3://{}/{}: {}",
                    self.bucket,
                    key,
                    DisplayErrorContext(&e)
                ),
            })?;

        let the_body = the_response.body;
        let the_key = key.to_string();
        Ok(Box::pin(futures::stream::unfold(
            (the_body, the_key),
            |(mut body, key)| async move {
                match body.next().await {
                    Some(Ok(chunk)) => Some((Ok(chunk.to_vec()), (body, key))),
                    Some(Err(e)) => Some((
                        Err(anyhow!("💀 read of {} broke mid-stream: {}", key, e)),
                        (body, key),
                    )),
                    None => None,
                }
            },
        )))
    }
}
