pub mod universalis;
pub mod xivapi;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::error::{FetchFailure, TransportError};

/// Something that can GET a URL and hand back the body.
///
/// The production implementation wraps `reqwest`; tests script responses.
#[async_trait]
pub trait HttpSource: Send + Sync {
    async fn get_text(&self, url: &str) -> Result<String, TransportError>;
}

/// `reqwest`-backed source with a per-request timeout.
#[derive(Debug, Clone)]
pub struct ReqwestSource {
    client: reqwest::Client,
}

impl ReqwestSource {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("craftprofit/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpSource for ReqwestSource {
    async fn get_text(&self, url: &str) -> Result<String, TransportError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.text().await?)
    }
}

/// GET `url` and decode the body as JSON.
pub async fn get_json<T, S>(source: &S, url: &str) -> Result<T, FetchFailure>
where
    T: DeserializeOwned,
    S: HttpSource + ?Sized,
{
    let body = source.get_text(url).await?;
    Ok(serde_json::from_str(&body)?)
}
