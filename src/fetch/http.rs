//! HTTP client abstraction for testability.

use super::FetchError;
use std::time::Duration;
use tracing::debug;

/// Blocking GET of a whole response body.
///
/// A non-success status is an error; callers never see error pages as
/// content.
pub trait HttpClient {
    fn get(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

impl<H: HttpClient + ?Sized> HttpClient for &H {
    fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        (**self).get(url)
    }
}

/// User-Agent sent with every request.
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Production client backed by `reqwest`.
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Client whose requests give up after `timeout_secs`. Chart archives
    /// run to hundreds of megabytes, so this should be generous.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        debug!(url, "GET");
        let response = self.client.get(url).send().map_err(|e| FetchError::Http {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| FetchError::Http {
                url: url.to_string(),
                message: format!("failed to read body: {e}"),
            })
    }
}
