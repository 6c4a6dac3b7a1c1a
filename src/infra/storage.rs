use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::BehaviorVersion;
use aws_config::Region;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::config::AppConfig;

#[async_trait]
pub trait PictureStore: Send + Sync {
    async fn put(&self, key: &str, content_type: &str, body: Bytes) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
}

#[derive(Clone)]
pub struct ObjectStorage {
    client: Client,
    bucket: String,
}

impl ObjectStorage {
    pub async fn new(config: &AppConfig) -> Result<Self> {
        let region_provider = RegionProviderChain::first_try(Region::new(config.s3_region.clone()));
        let shared_config = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .load()
            .await;

        let mut s3_builder = aws_sdk_s3::config::Builder::from(&shared_config)
            .region(shared_config.region().cloned())
            .endpoint_url(config.s3_endpoint.clone())
            .force_path_style(true);
        if let Some(provider) = shared_config.credentials_provider() {
            s3_builder = s3_builder.credentials_provider(provider);
        }

        Ok(Self {
            client: Client::from_conf(s3_builder.build()),
            bucket: config.s3_bucket.clone(),
        })
    }
}

#[async_trait]
impl PictureStore for ObjectStorage {
    async fn put(&self, key: &str, content_type: &str, body: Bytes) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await?;
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MemoryPictureStore {
    objects: Arc<Mutex<HashMap<String, (String, Bytes)>>>,
    fail_deletes: bool,
}

impl MemoryPictureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose deletes always fail, for exercising cleanup paths.
    pub fn failing_deletes() -> Self {
        Self {
            fail_deletes: true,
            ..Self::default()
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().contains_key(key)
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects.lock().get(key).map(|(content_type, _)| content_type.clone())
    }

    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PictureStore for MemoryPictureStore {
    async fn put(&self, key: &str, content_type: &str, body: Bytes) -> Result<()> {
        self.objects
            .lock()
            .insert(key.to_string(), (content_type.to_string(), body));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        if self.fail_deletes {
            return Err(anyhow!("delete refused for {}", key));
        }
        self.objects.lock().remove(key);
        Ok(())
    }
}
