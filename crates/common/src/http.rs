//! Retrying JSON-over-HTTP client used for every remote endpoint.

use std::time::Duration;

use bifrost_tasks::ShutdownSignal;
use reqwest::{header::CONTENT_TYPE, Method};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use crate::retry::{
    policies::ExponentialBackoff, retry_with_backoff, RetryError, RetryLimits, Retryable,
};

/// Longest response excerpt kept in an error message.
const MAX_ERROR_BODY_LEN: usize = 256;

#[derive(Debug, Error)]
pub enum HttpError {
    /// Connection error, retry might help
    #[error("could not connect: {0}")]
    Connection(String),

    /// Timeout error, retry might help
    #[error("timeout")]
    Timeout,

    /// General request error, retry might help
    #[error("could not send request: {0}")]
    Request(String),

    /// Non-2xx reply, retried only for server-side failures
    #[error("obtained failure status({0}): {1}")]
    Status(u16, String),

    /// Body error, unlikely to be recoverable by retrying
    #[error("body: {0}")]
    Body(String),

    /// 2xx reply that does not decode, not retryable
    #[error("malformed response: {0}")]
    Parse(String),

    /// Error building the request, unlikely to be recoverable
    #[error("could not build request: {0}")]
    Builder(String),

    /// Redirect error, not retryable
    #[error("redirect: {0}")]
    Redirect(String),

    #[error("max retries {0} exceeded: {1}")]
    MaxRetriesExceeded(u16, String),

    #[error("aborted by shutdown")]
    Shutdown,

    #[error("{0}")]
    Other(String),
}

pub type HttpResult<T> = Result<T, HttpError>;

impl Retryable for HttpError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout | Self::Request(_) => true,
            Self::Status(code, _) => *code >= 500 || *code == 429,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for HttpError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_body() {
            Self::Body(err.to_string())
        } else if err.is_status() {
            match err.status() {
                Some(code) => Self::Status(code.as_u16(), err.to_string()),
                None => Self::Other(err.to_string()),
            }
        } else if err.is_decode() {
            Self::Parse(err.to_string())
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else if err.is_timeout() {
            Self::Timeout
        } else if err.is_request() {
            Self::Request(err.to_string())
        } else if err.is_builder() {
            Self::Builder(err.to_string())
        } else if err.is_redirect() {
            Self::Redirect(err.to_string())
        } else {
            Self::Other(err.to_string())
        }
    }
}

impl From<serde_json::Error> for HttpError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<RetryError<HttpError>> for HttpError {
    fn from(err: RetryError<HttpError>) -> Self {
        match err {
            RetryError::Permanent(e) => e,
            RetryError::Exhausted { attempts, last } => {
                Self::MaxRetriesExceeded(attempts, last.to_string())
            }
            RetryError::Shutdown => Self::Shutdown,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Timeout of a single request.
    pub request_timeout: Duration,
    pub limits: RetryLimits,
    pub backoff: ExponentialBackoff,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            limits: RetryLimits::default(),
            backoff: ExponentialBackoff::default(),
        }
    }
}

/// Thin wrapper over [`reqwest::Client`] that retries transient failures
/// with exponential backoff and gives up when shutdown is signalled.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    limits: RetryLimits,
    backoff: ExponentialBackoff,
    shutdown: ShutdownSignal,
}

impl HttpClient {
    pub fn new(config: HttpClientConfig, shutdown: ShutdownSignal) -> HttpResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| HttpError::Builder(format!("could not create client: {e}")))?;

        Ok(Self {
            client,
            limits: config.limits,
            backoff: config.backoff,
            shutdown,
        })
    }

    pub fn shutdown_signal(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    /// `GET`s `url` and decodes the JSON reply.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> HttpResult<T> {
        let body = self.send_with_retry(Method::GET, url, None).await?;
        decode(url, &body)
    }

    /// `POST`s `body` as JSON and decodes the JSON reply.
    pub async fn post_json<B, T>(&self, url: &str, body: &B) -> HttpResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let payload = serde_json::to_vec(body)
            .map_err(|e| HttpError::Builder(format!("could not encode body: {e}")))?;
        let body = self
            .send_with_retry(Method::POST, url, Some((payload, "application/json")))
            .await?;
        decode(url, &body)
    }

    /// `POST`s a plain-text body and decodes the JSON reply.
    pub async fn post_text<T: DeserializeOwned>(&self, url: &str, body: String) -> HttpResult<T> {
        let body = self
            .send_with_retry(Method::POST, url, Some((body.into_bytes(), "text/plain")))
            .await?;
        decode(url, &body)
    }

    async fn send_with_retry(
        &self,
        method: Method,
        url: &str,
        body: Option<(Vec<u8>, &'static str)>,
    ) -> HttpResult<Vec<u8>> {
        let body = body.as_ref();
        let res = retry_with_backoff(url, self.limits, &self.backoff, &self.shutdown, || {
            self.send_once(method.clone(), url, body)
        })
        .await?;
        Ok(res)
    }

    async fn send_once(
        &self,
        method: Method,
        url: &str,
        body: Option<&(Vec<u8>, &'static str)>,
    ) -> HttpResult<Vec<u8>> {
        trace!(%method, %url, "sending request");
        let mut req = self.client.request(method, url);
        if let Some((payload, content_type)) = body {
            req = req.header(CONTENT_TYPE, *content_type).body(payload.clone());
        }

        let resp = req.send().await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;

        if !status.is_success() {
            debug!(%url, status = %status.as_u16(), "request failed");
            return Err(HttpError::Status(status.as_u16(), excerpt(&bytes)));
        }
        Ok(bytes.to_vec())
    }
}

fn decode<T: DeserializeOwned>(url: &str, body: &[u8]) -> HttpResult<T> {
    serde_json::from_slice(body)
        .map_err(|e| HttpError::Parse(format!("{url}: {e}: {}", excerpt(body))))
}

fn excerpt(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    text.chars().take(MAX_ERROR_BODY_LEN).collect()
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;
    use crate::test_utils::{Route, StubServer};

    #[derive(Debug, Deserialize, PartialEq)]
    struct Height {
        height: String,
    }

    fn fast_client() -> HttpClient {
        let config = HttpClientConfig {
            request_timeout: Duration::from_secs(5),
            limits: RetryLimits {
                max_attempts: 3,
                max_elapsed: Duration::from_secs(5),
            },
            backoff: ExponentialBackoff::new(10, 2, 1),
        };
        HttpClient::new(config, ShutdownSignal::new()).unwrap()
    }

    #[tokio::test]
    async fn test_get_json_ok() {
        let server = StubServer::start(vec![Route::get("/h", 200, r#"{"height":"10"}"#)]).await;
        let client = fast_client();

        let res: Height = client.get_json(&format!("{}/h", server.url())).await.unwrap();

        assert_eq!(res.height, "10");
        assert_eq!(server.hits("/h"), 1);
    }

    #[tokio::test]
    async fn test_server_error_is_retried() {
        let server = StubServer::start(vec![
            Route::get("/h", 500, "oops").then(200, r#"{"height":"11"}"#)
        ])
        .await;
        let client = fast_client();

        let res: Height = client.get_json(&format!("{}/h", server.url())).await.unwrap();

        assert_eq!(res.height, "11");
        assert_eq!(server.hits("/h"), 2);
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let server = StubServer::start(vec![]).await;
        let client = fast_client();

        let res = client.get_json::<Height>(&format!("{}/h", server.url())).await;

        assert!(matches!(res, Err(HttpError::Status(404, _))), "got {res:?}");
        assert_eq!(server.hits("/h"), 1);
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_error() {
        let server = StubServer::start(vec![Route::get("/h", 200, "<html>")]).await;
        let client = fast_client();

        let res = client.get_json::<Height>(&format!("{}/h", server.url())).await;

        assert!(matches!(res, Err(HttpError::Parse(_))), "got {res:?}");
        assert_eq!(server.hits("/h"), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let server = StubServer::start(vec![Route::get("/h", 503, "busy")]).await;
        let client = fast_client();

        let res = client.get_json::<Height>(&format!("{}/h", server.url())).await;

        assert!(
            matches!(res, Err(HttpError::MaxRetriesExceeded(3, _))),
            "got {res:?}"
        );
        assert_eq!(server.hits("/h"), 3);
    }

    #[tokio::test]
    async fn test_post_text_sends_plain_body() {
        let server = StubServer::start(vec![Route::post("/b", 200, r#"{"height":"1"}"#)]).await;
        let client = fast_client();

        let _: Height = client
            .post_text(&format!("{}/b", server.url()), "c401f0".to_string())
            .await
            .unwrap();

        let reqs = server.requests();
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].method, "POST");
        assert_eq!(reqs[0].body, "c401f0");
    }

    #[tokio::test]
    async fn test_shutdown_aborts_request() {
        let shutdown = ShutdownSignal::new();
        let client = HttpClient::new(HttpClientConfig::default(), shutdown.clone()).unwrap();
        shutdown.send();

        let res = client.get_json::<Height>("http://127.0.0.1:1/").await;

        assert!(matches!(res, Err(HttpError::Shutdown)), "got {res:?}");
    }
}
