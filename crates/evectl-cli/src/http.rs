//! HTTP capability backed by reqwest.
//!
//! The server session lives in cookies. Clearing them swaps in a client with
//! a fresh cookie jar; requests already running keep the old one.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use evectl_core::error::HttpError;
use evectl_core::host::HttpClient;
use reqwest::cookie::Jar;
use tracing::{debug, warn};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// HTTP client errors raised while building the client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP client could not be built: {0}")]
    Build(#[from] reqwest::Error),
}

/// Cookie-aware [`HttpClient`] for the ticketing server.
#[derive(Debug)]
pub struct ReqwestHttp {
    client: RwLock<reqwest::Client>,
    timeout: Duration,
}

impl ReqwestHttp {
    pub fn new(timeout: Duration) -> Result<Self, ClientError> {
        // reqwest is built with rustls-no-provider. The `Err` case just means
        // a provider was already installed.
        let _ = rustls::crypto::ring::default_provider().install_default();
        Ok(Self {
            client: RwLock::new(build_client(timeout)?),
            timeout,
        })
    }

    fn current(&self) -> reqwest::Client {
        self.client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn body(resp: reqwest::Response) -> Result<String, HttpError> {
        let status = resp.status();
        if !status.is_success() {
            return Err(HttpError::Status(status.as_u16()));
        }
        resp.text().await.map_err(transport)
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .cookie_provider(Arc::new(Jar::default()))
        .timeout(timeout)
        .user_agent(concat!("evectl/", env!("CARGO_PKG_VERSION")))
        .build()
}

fn transport(e: reqwest::Error) -> HttpError {
    HttpError::Transport(e.to_string())
}

#[async_trait]
impl HttpClient for ReqwestHttp {
    async fn get(&self, url: &str) -> Result<String, HttpError> {
        debug!(url, "GET");
        let resp = self.current().get(url).send().await.map_err(transport)?;
        Self::body(resp).await
    }

    async fn post_form(
        &self,
        url: &str,
        fields: &[(String, String)],
    ) -> Result<String, HttpError> {
        debug!(url, fields = fields.len(), "POST");
        let resp = self
            .current()
            .post(url)
            .form(fields)
            .send()
            .await
            .map_err(transport)?;
        Self::body(resp).await
    }

    fn clear_cookies(&self) {
        match build_client(self.timeout) {
            Ok(fresh) => {
                *self.client.write().unwrap_or_else(PoisonError::into_inner) = fresh;
                debug!("Cookie jar reset");
            }
            Err(e) => warn!(error = %e, "Cookie jar could not be reset"),
        }
    }
}
