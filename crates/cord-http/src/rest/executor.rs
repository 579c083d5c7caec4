//! Request execution
//!
//! Every request goes through the rate limiter: acquire the route's bucket,
//! send, release with the response headers, then branch on the status.
//! Retries re-acquire the same bucket, so cooldowns apply to them as well.

use cord_common::{RestConfig, TaskSupervisor};
use cord_core::events::{RateLimit, TooManyRequests};
use cord_core::EventSink;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::error::{RestError, RestResult, StatusError};
use crate::ratelimit::RateLimiter;

const JSON: &str = "application/json";

/// Route key of a URL: everything before the query string
pub fn route_key(url: &str) -> &str {
    url.split_once('?').map_or(url, |(path, _)| path)
}

#[derive(Debug, Deserialize)]
struct GatewayResponse {
    url: String,
}

/// Rate-limited REST client
pub struct RestClient {
    http: Client,
    config: RestConfig,
    limiter: Arc<RateLimiter>,
    events: Arc<dyn EventSink>,
}

impl RestClient {
    pub fn new(
        config: RestConfig,
        supervisor: Arc<TaskSupervisor>,
        events: Arc<dyn EventSink>,
    ) -> RestResult<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        let limiter = Arc::new(RateLimiter::new(config.clock_skew_margin, supervisor));

        Ok(Self {
            http,
            config,
            limiter,
            events,
        })
    }

    pub fn config(&self) -> &RestConfig {
        &self.config
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Absolute URL for an API path such as `/gateway`
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base, path.trim_start_matches('/'))
    }

    /// Send a JSON request, bucketed by the URL's route key
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
    ) -> RestResult<Vec<u8>> {
        self.request_with_bucket(method, url, body, route_key(url))
            .await
    }

    /// Send a JSON request on an explicit bucket
    ///
    /// Routes whose URL embeds a non-major id (message ids, for example)
    /// share a bucket this way.
    pub async fn request_with_bucket(
        &self,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
        route_key: &str,
    ) -> RestResult<Vec<u8>> {
        self.execute(method, url, JSON, body.unwrap_or_default(), route_key, 0)
            .await
    }

    /// Serialize `body`, send it, and decode the response
    pub async fn request_json<B, T>(&self, method: Method, url: &str, body: Option<&B>) -> RestResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = body.map(serde_json::to_vec).transpose()?;
        let response = self.request(method, url, body).await?;
        Ok(serde_json::from_slice(&response)?)
    }

    /// Resolve the gateway websocket URL
    pub async fn gateway(&self) -> RestResult<String> {
        let url = self.endpoint("/gateway");
        let response: GatewayResponse = self.request_json::<(), _>(Method::GET, &url, None).await?;
        Ok(response.url)
    }

    /// Run one request to completion
    ///
    /// `attempt` counts 502 retries already spent. Rate-limited retries do
    /// not count against it.
    #[instrument(skip(self, content_type, body))]
    pub async fn execute(
        &self,
        method: Method,
        url: &str,
        content_type: &str,
        body: Vec<u8>,
        route_key: &str,
        attempt: u32,
    ) -> RestResult<Vec<u8>> {
        let mut attempt = attempt;
        let mut locked = self.limiter.acquire(route_key).await;
        let bucket = locked.bucket().clone();

        loop {
            debug!(%method, url, attempt, "API request");

            let mut request = self
                .http
                .request(method.clone(), url)
                .header(CONTENT_TYPE, content_type)
                .body(body.clone());
            if !self.config.token.is_empty() {
                request = request.header(AUTHORIZATION, &self.config.token);
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(err) => {
                    self.limiter.release(locked, None)?;
                    return Err(err.into());
                }
            };

            let status = response.status();
            let headers = response.headers().clone();
            self.limiter.release(locked, Some(&headers))?;
            let payload = response.bytes().await?.to_vec();

            debug!(%status, bytes = payload.len(), "API response");

            match status {
                StatusCode::OK | StatusCode::CREATED | StatusCode::NO_CONTENT => {
                    return Ok(payload);
                }
                StatusCode::BAD_GATEWAY if attempt < self.config.max_rest_retries => {
                    info!(url, %status, attempt, "request failed, retrying");
                    attempt += 1;
                }
                StatusCode::BAD_GATEWAY => {
                    return Err(RestError::MaxRetries {
                        status,
                        body: String::from_utf8_lossy(&payload).into_owned(),
                    });
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    let too_many_requests: TooManyRequests = serde_json::from_slice(&payload)?;

                    if !self.config.retry_on_rate_limit {
                        return Err(RestError::RateLimited {
                            url: url.to_string(),
                            too_many_requests,
                        });
                    }

                    info!(
                        url,
                        retry_after_ms = too_many_requests.retry_after.as_millis() as u64,
                        global = too_many_requests.global,
                        "rate limited"
                    );
                    let wait = too_many_requests.retry_after;
                    self.events.emit(
                        RateLimit {
                            too_many_requests,
                            url: url.to_string(),
                        }
                        .into(),
                    );
                    tokio::time::sleep(wait).await;
                }
                _ => {
                    let mut err = StatusError::new(method, url, status, headers, payload);
                    if status == StatusCode::UNAUTHORIZED && !self.config.token.starts_with("Bot ") {
                        warn!(
                            "HTTP request was unauthorized. The token may be missing its \"Bot \" prefix"
                        );
                        err.token_prefix_hint = true;
                    }
                    return Err(err.into());
                }
            }

            locked = self.limiter.acquire_bucket(bucket.clone()).await;
        }
    }
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("api_base", &self.config.api_base)
            .field("buckets", &self.limiter.bucket_count())
            .finish_non_exhaustive()
    }
}
