//! HTTP plumbing shared by every endpoint

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::ApiConfig;
use crate::display::StepResponse;
use crate::error::{ApiError, Operation, detail_or_body, error_detail};
use crate::retry::RetryPolicy;

/// PerryOps backend client
///
/// Holds one connection pool and the endpoint settings. Every operation is a
/// single independent request; no session state is kept between calls.
#[derive(Debug, Clone)]
pub struct PerryClient {
    http: Client,
    config: ApiConfig,
    base_url: String,
    token: Option<String>,
    retry: RetryPolicy,
}

impl PerryClient {
    /// Create a client from configuration, picking up the bearer token from the environment
    pub fn from_config(config: &ApiConfig) -> Result<Self, ApiError> {
        debug!(base_url = %config.base_url, "from_config: called");
        let client = Self::new(config.clone())?;
        Ok(match config.token() {
            Some(token) => client.with_token(token),
            None => client,
        })
    }

    /// Create a client without a bearer token
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let http = Client::builder()
            .user_agent(concat!("perryops/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ApiError::Network)?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::from(&config.retry),
            token: None,
            config,
        })
    }

    /// Attach a bearer token to every request
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Base URL extended by `segments`, each percent-encoded as a single path segment
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url =
            Url::parse(&self.base_url).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    /// Send a request built by `build`, then hand status and body to `check`
    ///
    /// `build` runs once per attempt so non-clonable bodies (multipart) can be rebuilt.
    pub(crate) async fn execute<T, B, C>(&self, name: &str, timeout: Duration, build: B, check: C) -> Result<T, ApiError>
    where
        B: Fn() -> Result<RequestBuilder, ApiError>,
        C: Fn(u16, String) -> Result<T, ApiError>,
    {
        debug!(%name, ?timeout, "execute: called");
        let build = &build;
        let check = &check;
        self.retry
            .run(name, move || async move {
                let mut request = build()?.timeout(timeout);
                if let Some(token) = &self.token {
                    request = request.bearer_auth(token);
                }

                let response = request.send().await.map_err(|e| ApiError::transport(e, timeout))?;
                let status = response.status().as_u16();
                let body = response.text().await.map_err(|e| ApiError::transport(e, timeout))?;
                debug!(%name, status, body_len = body.len(), "execute: response received");
                check(status, body)
            })
            .await
    }

    /// POST a workflow step and reduce the reply to a [`StepResponse`]
    pub(crate) async fn step<B>(
        &self,
        operation: Operation,
        keys: &'static [&'static str],
        timeout: Duration,
        build: B,
    ) -> Result<StepResponse, ApiError>
    where
        B: Fn() -> Result<RequestBuilder, ApiError>,
    {
        let name = operation.to_string();
        self.execute(&name, timeout, build, |status, body| {
            if (200..300).contains(&status) {
                Ok(StepResponse::parse(body, keys))
            } else {
                Err(ApiError::StepFailed {
                    operation,
                    status,
                    detail: detail_or_body(&body),
                })
            }
        })
        .await
    }

    /// GET a JSON resource; `what` names it in the fallback error message
    pub(crate) async fn get_json<T: DeserializeOwned>(&self, url: Url, what: &str) -> Result<T, ApiError> {
        self.execute(what, self.config.read_timeout(), || Ok(self.http.get(url.clone())), |status, body| {
            parse_json_reply(status, &body, what)
        })
        .await
    }
}

/// Decode a 200 reply as `T`, or surface the backend's error detail
pub(crate) fn parse_json_reply<T: DeserializeOwned>(status: u16, body: &str, what: &str) -> Result<T, ApiError> {
    if status == 200 {
        return Ok(serde_json::from_str(body)?);
    }
    Err(failure(status, body, what))
}

/// Error for a non-200 read: first structured detail message, else a generic one
pub(crate) fn failure(status: u16, body: &str, what: &str) -> ApiError {
    let message = error_detail(body).unwrap_or_else(|| format!("Failed to load {} (status {})", what, status));
    ApiError::Request { status, message }
}
