//! Thin HTTP client used by the `post` and `get` CLI subcommands to talk to
//! an already-running `yokai serve`/`yokai run` instance.

use std::time::Duration;

use crate::core::error::ClientError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct Client {
    http: reqwest::Client,
    base_url: String,
}

impl Client {
    pub fn new(port: u16) -> Self {
        Self::with_host("localhost", port)
    }

    pub fn with_host(host: &str, port: u16) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(DEFAULT_TIMEOUT)
                .build()
                .expect("reqwest client with only timeout configured cannot fail to build"),
            base_url: format!("http://{host}:{port}"),
        }
    }

    pub async fn post(&self, topic: &str, payload: &str) -> Result<(), ClientError> {
        let response = self
            .http
            .post(format!("{}/{}", self.base_url, topic))
            .header("Content-Type", "text/plain")
            .body(payload.to_string())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status { status, body });
        }
        Ok(())
    }

    pub async fn get(&self, view: &str) -> Result<String, ClientError> {
        let response = self.http.get(format!("{}/{}", self.base_url, view)).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status { status, body });
        }
        Ok(response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_uses_localhost_and_configured_port() {
        let client = Client::new(8000);
        assert_eq!(client.base_url, "http://localhost:8000");
    }
}
