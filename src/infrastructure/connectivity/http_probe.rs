use crate::application::ports::connectivity_probe::ConnectivityProbe;
use crate::shared::error::AppError;
use async_trait::async_trait;
use std::time::Duration;

/// HEAD リクエストで到達性を確認する。ステータスコードは問わない
pub struct HttpConnectivityProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpConnectivityProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ConnectivityProbe for HttpConnectivityProbe {
    async fn check(&self) -> bool {
        match self.client.head(&self.url).send().await {
            Ok(_) => true,
            Err(err) => {
                tracing::debug!(
                    target: "offline::connectivity",
                    url = %self.url,
                    error = %err,
                    "connectivity probe failed"
                );
                false
            }
        }
    }
}
