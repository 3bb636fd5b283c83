use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use tracing::debug;

use crate::core::error::{InstallerError, InstallerResult};

/// Where manifests and artifacts come from, addressed by file name
/// relative to a fixed base.
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    async fn fetch_text(&self, name: &str) -> InstallerResult<String>;
    async fn fetch_bytes(&self, name: &str) -> InstallerResult<Bytes>;
}

/// HTTP source rooted at the remote repository's `files/` folder.
pub struct RemoteSource {
    client: Client,
    base_url: String,
}

impl RemoteSource {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn url(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name.trim_start_matches('/'))
    }

    async fn get(&self, name: &str) -> InstallerResult<reqwest::Response> {
        let url = self.url(name);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(InstallerError::DownloadFailed {
                url,
                status: status.as_u16(),
            });
        }

        debug!("GET {} -> {}", url, status);
        Ok(response)
    }
}

#[async_trait]
impl ArtifactSource for RemoteSource {
    async fn fetch_text(&self, name: &str) -> InstallerResult<String> {
        Ok(self.get(name).await?.text().await?)
    }

    async fn fetch_bytes(&self, name: &str) -> InstallerResult<Bytes> {
        Ok(self.get(name).await?.bytes().await?)
    }
}
