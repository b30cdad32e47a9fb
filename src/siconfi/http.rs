use std::time::Duration;

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};

use super::Transport;

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!("siconfi-extractor/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    fn url(&self, resource: &str) -> String {
        endpoint_url(&self.base_url, resource)
    }
}

fn endpoint_url(base_url: &str, resource: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        resource.trim_start_matches('/')
    )
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn get(
        &self,
        resource: &str,
        params: &[(&'static str, String)],
        timeout: Duration,
    ) -> anyhow::Result<serde_json::Value> {
        let response = self
            .client
            .get(self.url(resource))
            .query(params)
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "SICONFI API error ({}): {}",
                status,
                truncate(&error_body, 200)
            ));
        }

        Ok(response.json().await?)
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
