//! Dune Analytics API client
//!
//! Thin async wrapper over the Dune REST API (and the Sim by Dune wallet API).
//! Every call is authenticated with the configured API key and returns either
//! parsed JSON or a typed [`HandlerError`].
//!
//! ## Endpoints
//!
//! - `POST /query/{id}/execute`, `GET /execution/{id}/status`,
//!   `GET /execution/{id}/results`, `GET /query/{id}/results`, `GET /query/{id}`
//! - `GET /trends/evm/contracts/{chain}`, `GET /dex/pairs/{chain}`,
//!   `GET /marketshare/{market}/{chain}`
//! - Sim: `GET /evm/{balances|transactions|collectibles}/{address}`
//!
//! The only retry performed is for HTTP 429 responses that carry a
//! `Retry-After` header.

pub mod types;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, RETRY_AFTER, USER_AGENT};
use reqwest::{RequestBuilder, StatusCode, Url};
use serde_json::Value as JsonValue;
use std::time::Duration;

use crate::config::{ConfigError, HandlerConfig};
use crate::error::{HandlerError, Result};

pub use types::{
    ExecuteParams, ExecutionHandle, ExecutionResults, ExecutionState, ResultMetadata,
    WalletEndpoint,
};

const DUNE_API_KEY_HEADER: &str = "X-Dune-Api-Key";
const SIM_API_KEY_HEADER: &str = "X-Sim-Api-Key";

/// Execution id used by the connectivity probe; never exists remotely
const PROBE_EXECUTION_ID: &str = "00000000-0000-0000-0000-000000000000";

#[derive(Debug, Clone, Copy)]
enum Api {
    Dune,
    Sim,
}

#[derive(Debug, Clone)]
pub struct DuneClient {
    http: reqwest::Client,
    api_key: String,
    base_url: Url,
    sim_base_url: Url,
    rate_limit_retries: u32,
    max_retry_after: Duration,
    poll_interval: Duration,
    max_poll_attempts: u32,
}

impl DuneClient {
    pub fn new(config: &HandlerConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("dune-handler/", env!("CARGO_PKG_VERSION"))),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout())
            .build()
            .map_err(|e| HandlerError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            base_url: parse_base_url("base_url", &config.base_url)?,
            sim_base_url: parse_base_url("sim_base_url", &config.sim_base_url)?,
            rate_limit_retries: config.rate_limit_retries,
            max_retry_after: config.max_retry_after(),
            poll_interval: config.poll_interval(),
            max_poll_attempts: config.max_poll_attempts,
        })
    }

    /// Trigger a new execution of a saved query
    pub async fn execute_query(
        &self,
        query_id: u64,
        params: &ExecuteParams,
    ) -> Result<ExecutionHandle> {
        let url = self.url(Api::Dune, &["query", &query_id.to_string(), "execute"])?;
        log::info!("▶️  Executing Dune query {}", query_id);

        let response = self
            .send(Api::Dune, || self.http.post(url.clone()).json(params))
            .await?;
        let handle: ExecutionHandle = serde_json::from_value(response)?;

        log::info!(
            "Execution {} created for query {} ({})",
            handle.execution_id,
            query_id,
            handle.state
        );
        Ok(handle)
    }

    pub async fn get_execution_status(&self, execution_id: &str) -> Result<JsonValue> {
        let url = self.url(Api::Dune, &["execution", execution_id, "status"])?;
        self.send(Api::Dune, || self.http.get(url.clone())).await
    }

    /// Results of one execution. Paged responses are followed through
    /// `next_offset` until exhausted or `limit` rows are held.
    pub async fn get_execution_results(
        &self,
        execution_id: &str,
        limit: Option<usize>,
    ) -> Result<ExecutionResults> {
        let url = self.url(Api::Dune, &["execution", execution_id, "results"])?;
        self.fetch_results(url, limit).await
    }

    /// Latest stored results of a query, without triggering an execution
    pub async fn get_latest_results(
        &self,
        query_id: u64,
        limit: Option<usize>,
    ) -> Result<ExecutionResults> {
        let url = self.url(Api::Dune, &["query", &query_id.to_string(), "results"])?;
        self.fetch_results(url, limit).await
    }

    async fn fetch_results(&self, url: Url, limit: Option<usize>) -> Result<ExecutionResults> {
        let response = self
            .send(Api::Dune, || with_limit(self.http.get(url.clone()), limit))
            .await?;
        let mut results: ExecutionResults = serde_json::from_value(response)?;

        while let Some(offset) = results.next_offset {
            if !results.state().is_success() {
                break;
            }
            let held = results.rows().len();
            let remaining = match limit {
                Some(limit) if held >= limit => break,
                Some(limit) => Some(limit - held),
                None => None,
            };

            log::debug!(
                "📄 {} has more rows, fetching from offset {} ({} held)",
                results.execution_id,
                offset,
                held
            );
            let response = self
                .send(Api::Dune, || {
                    with_limit(self.http.get(url.clone()), remaining).query(&[("offset", offset)])
                })
                .await?;
            let page: ExecutionResults = serde_json::from_value(response)?;

            if matches!(page.next_offset, Some(next) if next <= offset) {
                return Err(HandlerError::malformed(format!(
                    "{}: next_offset did not advance past {}",
                    url, offset
                )));
            }
            results.append_page(page);
        }

        if let Some(limit) = limit {
            results.truncate_rows(limit);
        }
        Ok(results)
    }

    /// Fetch execution results, polling while the execution is still running.
    ///
    /// Failed, cancelled and expired executions become
    /// [`HandlerError::ExecutionFailed`]; an execution still pending after
    /// `max_poll_attempts` polls, or in a state this client does not know, is
    /// [`HandlerError::ExecutionPending`].
    pub async fn wait_for_results(
        &self,
        execution_id: &str,
        limit: Option<usize>,
    ) -> Result<ExecutionResults> {
        let mut attempt = 0;
        loop {
            let results = self.get_execution_results(execution_id, limit).await?;
            let state = results.state();

            if state.is_success() {
                return Ok(results);
            }
            if state.is_failure() {
                return Err(HandlerError::ExecutionFailed {
                    execution_id: results.execution_id.clone(),
                    state: state.to_string(),
                    message: results.error_message(),
                });
            }
            // States this client does not know are not waited on
            if !state.is_pending() || attempt >= self.max_poll_attempts {
                return Err(HandlerError::ExecutionPending {
                    execution_id: results.execution_id,
                    state: state.to_string(),
                });
            }

            attempt += 1;
            log::debug!(
                "Execution {} is {}, polling again ({}/{})",
                execution_id,
                state,
                attempt,
                self.max_poll_attempts
            );
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Saved query metadata
    pub async fn get_query(&self, query_id: u64) -> Result<JsonValue> {
        let url = self.url(Api::Dune, &["query", &query_id.to_string()])?;
        self.send(Api::Dune, || self.http.get(url.clone())).await
    }

    pub async fn trending_contracts(&self, chain: &str, limit: Option<usize>) -> Result<JsonValue> {
        let url = self.url(Api::Dune, &["trends", "evm", "contracts", chain])?;
        self.send(Api::Dune, || with_limit(self.http.get(url.clone()), limit))
            .await
    }

    pub async fn dex_pairs(&self, chain: &str, limit: Option<usize>) -> Result<JsonValue> {
        let url = self.url(Api::Dune, &["dex", "pairs", chain])?;
        self.send(Api::Dune, || with_limit(self.http.get(url.clone()), limit))
            .await
    }

    pub async fn market_share(
        &self,
        market: &str,
        chain: &str,
        limit: Option<usize>,
    ) -> Result<JsonValue> {
        let url = self.url(Api::Dune, &["marketshare", market, chain])?;
        self.send(Api::Dune, || with_limit(self.http.get(url.clone()), limit))
            .await
    }

    /// Sim wallet data: `GET {sim}/evm/{balances|transactions|collectibles}/{address}`
    async fn wallet(&self, endpoint: WalletEndpoint, address: &str) -> Result<JsonValue> {
        let url = self.url(Api::Sim, &["evm", endpoint.path(), address])?;
        self.send(Api::Sim, || self.http.get(url.clone())).await
    }

    pub async fn wallet_balances(&self, address: &str) -> Result<JsonValue> {
        self.wallet(WalletEndpoint::Balances, address).await
    }

    pub async fn wallet_transactions(&self, address: &str) -> Result<JsonValue> {
        self.wallet(WalletEndpoint::Transactions, address).await
    }

    pub async fn wallet_collectibles(&self, address: &str) -> Result<JsonValue> {
        self.wallet(WalletEndpoint::Collectibles, address).await
    }

    /// Status code of a lightweight authenticated request, used to check that
    /// the API key is accepted. Transport failures are returned as errors.
    pub async fn probe(&self) -> Result<StatusCode> {
        let url = self.url(Api::Dune, &["execution", PROBE_EXECUTION_ID, "status"])?;
        let response = self
            .authenticate(Api::Dune, self.http.get(url))
            .send()
            .await?;
        Ok(response.status())
    }

    fn url(&self, api: Api, segments: &[&str]) -> Result<Url> {
        let base = match api {
            Api::Dune => &self.base_url,
            Api::Sim => &self.sim_base_url,
        };
        let mut url = base.clone();
        match url.path_segments_mut() {
            Ok(mut path) => {
                path.pop_if_empty().extend(segments);
            }
            Err(()) => {
                return Err(HandlerError::Config(ConfigError::InvalidValue(format!(
                    "base URL cannot carry a path: {}",
                    base
                ))))
            }
        }
        Ok(url)
    }

    fn authenticate(&self, api: Api, request: RequestBuilder) -> RequestBuilder {
        let header = match api {
            Api::Dune => DUNE_API_KEY_HEADER,
            Api::Sim => SIM_API_KEY_HEADER,
        };
        request.header(header, &self.api_key)
    }

    /// Send a request built by `build`, mapping non-success statuses to
    /// errors. `build` is called again for each rate-limit retry.
    async fn send<F>(&self, api: Api, build: F) -> Result<JsonValue>
    where
        F: Fn() -> RequestBuilder,
    {
        if self.api_key.trim().is_empty() {
            return Err(HandlerError::Authentication("API key is required".to_string()));
        }

        let mut retries = 0;
        loop {
            let request = self.authenticate(api, build()).build()?;
            let method = request.method().clone();
            let url = request.url().clone();
            log::debug!("➡️  {} {}", method, url);

            let response = self.http.execute(request).await?;
            let status = response.status();

            if status.is_success() {
                let body = response.text().await?;
                return serde_json::from_str(&body).map_err(|e| {
                    HandlerError::malformed(format!("{} {}: invalid JSON body: {}", method, url, e))
                });
            }

            let retry_after = parse_retry_after(response.headers());
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    log::debug!("Could not read error body of {} {}: {}", method, url, e);
                    String::new()
                }
            };
            let message = error_message(status, body);
            log::warn!("⚠️  {} {} returned {}: {}", method, url, status, message);

            match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    return Err(HandlerError::Authentication(message));
                }
                StatusCode::NOT_FOUND => return Err(HandlerError::NotFound(message)),
                StatusCode::TOO_MANY_REQUESTS => match retry_after {
                    Some(delay) if retries < self.rate_limit_retries => {
                        let delay = delay.min(self.max_retry_after);
                        retries += 1;
                        log::warn!(
                            "⏳ Rate limited, retry {} of {} in {:?}",
                            retries,
                            self.rate_limit_retries,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                    }
                    _ => return Err(HandlerError::RateLimited { message, retry_after }),
                },
                _ => {
                    return Err(HandlerError::Api {
                        status: status.as_u16(),
                        message,
                    })
                }
            }
        }
    }
}

fn parse_base_url(name: &str, raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| {
        HandlerError::Config(ConfigError::InvalidValue(format!(
            "{} '{}': {}",
            name, raw, e
        )))
    })
}

fn with_limit(request: RequestBuilder, limit: Option<usize>) -> RequestBuilder {
    match limit {
        Some(limit) => request.query(&[("limit", limit)]),
        None => request,
    }
}

/// `Retry-After` as delta seconds or an HTTP date
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

    if let Ok(secs) = raw.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let at = DateTime::parse_from_rfc2822(raw).ok()?.with_timezone(&Utc);
    let delta = at.signed_duration_since(Utc::now());
    Some(delta.to_std().unwrap_or(Duration::ZERO))
}

/// Provider message from an error body, `{"error": "..."}` in practice
fn error_message(status: StatusCode, body: String) -> String {
    if let Ok(json) = serde_json::from_str::<JsonValue>(&body) {
        for key in ["error", "message", "detail"] {
            match json.get(key) {
                Some(JsonValue::String(msg)) => return msg.clone(),
                Some(JsonValue::Object(obj)) => {
                    if let Some(JsonValue::String(msg)) = obj.get("message") {
                        return msg.clone();
                    }
                }
                _ => {}
            }
        }
    }

    let body = body.trim();
    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string()
    } else {
        body.chars().take(500).collect()
    }
}
