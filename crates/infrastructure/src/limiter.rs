//! 远程限流服务客户端
//!
//! 与 web-api 暴露的 `POST /limiters/{identity}/check` 对接，响应体是 JSON 数字（秒）。

use std::sync::Arc;
use std::time::Duration;

use application::{LimiterDirectory, LimiterError, LimiterStub};
use async_trait::async_trait;
use domain::Identity;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

pub struct HttpLimiterDirectory {
    client: reqwest::Client,
    base_url: String,
}

impl HttpLimiterDirectory {
    pub fn new(base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        })
    }
}

impl LimiterDirectory for HttpLimiterDirectory {
    fn resolve(&self, identity: &Identity) -> Arc<dyn LimiterStub> {
        Arc::new(HttpLimiterStub {
            client: self.client.clone(),
            url: format!("{}/limiters/{}/check", self.base_url, identity),
        })
    }
}

pub struct HttpLimiterStub {
    client: reqwest::Client,
    url: String,
}

#[async_trait]
impl LimiterStub for HttpLimiterStub {
    async fn check(&self) -> Result<f64, LimiterError> {
        let response = self
            .client
            .post(&self.url)
            .send()
            .await
            .map_err(|err| LimiterError::transport(err.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(LimiterError::transport(format!("limiter service returned {status}")));
        }
        if !status.is_success() {
            return Err(LimiterError::invalid_response(format!(
                "limiter service returned {status}"
            )));
        }

        response
            .json::<f64>()
            .await
            .map_err(|err| LimiterError::invalid_response(err.to_string()))
    }
}
