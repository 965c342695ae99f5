//! Blocking InfluxDB 1.x HTTP client (`/write` and `/query`) over libcurl.
//!
//! Each request uses its own `Easy` handle, so one client is shared freely
//! between worker threads.

use curl::easy::{Easy, List};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use crate::config::HttpConfig;
use crate::error::BackendError;

/// Parameters for a line-protocol write.
#[derive(Debug, Clone, Default)]
pub struct WriteOpts<'a> {
    pub database: &'a str,
    pub retention_policy: Option<&'a str>,
    /// Write consistency (`one`, `quorum`, `all`, `any`); server default when unset.
    pub consistency: Option<&'a str>,
}

/// Parameters for an InfluxQL query.
#[derive(Debug, Clone, Default)]
pub struct QueryOpts<'a> {
    pub database: &'a str,
    pub retention_policy: Option<&'a str>,
}

/// Body of a `/query` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub results: Vec<StatementResult>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Result of one statement within a query.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatementResult {
    #[serde(default)]
    pub series: Vec<Series>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Series {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub values: Vec<Vec<serde_json::Value>>,
}

impl Series {
    /// Position of `name` among the columns.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

#[derive(Debug, Clone)]
pub struct InfluxClient {
    base: Url,
    connect_timeout: Duration,
    timeout: Duration,
}

impl InfluxClient {
    /// Client for the HTTP API at `base_url` (e.g. `http://localhost:8086`).
    pub fn new(base_url: &str) -> Result<Self, BackendError> {
        let base = Url::parse(base_url)?;
        if base.cannot_be_a_base() {
            return Err(BackendError::Other(format!("{base_url} cannot be used as a base URL")));
        }
        let defaults = HttpConfig::default();
        Ok(InfluxClient {
            base,
            connect_timeout: Duration::from_secs(defaults.connect_timeout_secs),
            timeout: Duration::from_secs(defaults.timeout_secs),
        })
    }

    pub fn from_config(base_url: &str, http: &HttpConfig) -> Result<Self, BackendError> {
        Ok(Self::new(base_url)?.with_timeouts(
            Duration::from_secs(http.connect_timeout_secs),
            Duration::from_secs(http.timeout_secs),
        ))
    }

    pub fn with_timeouts(mut self, connect: Duration, total: Duration) -> Self {
        self.connect_timeout = connect;
        self.timeout = total;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// `base` with `endpoint` appended to its path and `params` as the query string.
    fn endpoint(&self, endpoint: &str, params: &[(&str, &str)]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(endpoint);
        }
        if !params.is_empty() {
            let mut query = url.query_pairs_mut();
            for (k, v) in params {
                query.append_pair(k, v);
            }
        }
        url
    }

    fn easy(&self, url: &Url) -> Result<Easy, BackendError> {
        let mut easy = Easy::new();
        easy.url(url.as_str())?;
        easy.connect_timeout(self.connect_timeout)?;
        easy.timeout(self.timeout)?;
        Ok(easy)
    }

    /// Run the request and return `(status, body)`.
    fn perform(mut easy: Easy) -> Result<(u32, Vec<u8>), BackendError> {
        let mut body = Vec::new();
        {
            let mut transfer = easy.transfer();
            transfer.write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })?;
            transfer.perform()?;
        }
        let code = easy.response_code()?;
        Ok((code, body))
    }

    /// POST line-protocol `lines` to `/write`. Success is `204 No Content`.
    pub fn write(&self, lines: &[u8], opts: &WriteOpts<'_>) -> Result<(), BackendError> {
        let mut params = vec![("db", opts.database), ("precision", "s")];
        if let Some(rp) = opts.retention_policy {
            params.push(("rp", rp));
        }
        if let Some(c) = opts.consistency {
            params.push(("consistency", c));
        }
        let url = self.endpoint("write", &params);
        let mut easy = self.easy(&url)?;
        easy.post(true)?;
        easy.post_fields_copy(lines)?;
        let mut headers = List::new();
        headers.append("Content-Type: text/plain; charset=utf-8")?;
        // Large bodies would otherwise wait for a 100-continue round trip.
        headers.append("Expect:")?;
        easy.http_headers(headers)?;

        let (code, body) = Self::perform(easy)?;
        if code != 204 {
            return Err(BackendError::Status {
                code,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Ok(())
    }

    /// Run one InfluxQL statement via `GET /query` and return its result.
    pub fn query(&self, q: &str, opts: &QueryOpts<'_>) -> Result<StatementResult, BackendError> {
        let mut params = vec![("q", q), ("db", opts.database)];
        if let Some(rp) = opts.retention_policy {
            params.push(("rp", rp));
        }
        let url = self.endpoint("query", &params);
        tracing::trace!(%q, "influx query");
        let easy = self.easy(&url)?;
        let (code, body) = Self::perform(easy)?;

        let parsed: Result<QueryResponse, _> = serde_json::from_slice(&body);
        if code != 200 {
            if let Ok(QueryResponse { error: Some(e), .. }) = parsed {
                return Err(BackendError::Query(e));
            }
            return Err(BackendError::Status {
                code,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        let resp = parsed?;
        if let Some(e) = resp.error {
            return Err(BackendError::Query(e));
        }
        let result = resp
            .results
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::Query(format!("no results for {q}")))?;
        if let Some(e) = result.error {
            return Err(BackendError::Query(e));
        }
        Ok(result)
    }
}
