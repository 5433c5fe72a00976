use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use super::http::ValidatedUrl;
use crate::config::SearchConfig;
use crate::error::{AppError, ConfigError, ErrorKind};
use crate::model::{decode_results, SearchQuery, SearchResultItem};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("unexpected status {code}")]
    Status { code: u16 },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response body: {0}")]
    Malformed(String),

    #[error("no response after {after_ms}ms")]
    TimedOut { after_ms: u64 },

    #[error("search endpoint is not configured")]
    NotConfigured,
}

impl FetchError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Malformed(_) => ErrorKind::MalformedResponse,
            Self::NotConfigured => ErrorKind::InvalidConfig,
            Self::Status { .. } | Self::Transport(_) | Self::TimedOut { .. } => {
                ErrorKind::FetchFailed
            }
        }
    }
}

impl From<FetchError> for AppError {
    fn from(e: FetchError) -> Self {
        let message = match &e {
            FetchError::Status { code } => format!("HTTP {code}"),
            FetchError::Transport(_) => "network error".to_string(),
            FetchError::Malformed(_) => "malformed response".to_string(),
            FetchError::TimedOut { .. } => "request timed out".to_string(),
            FetchError::NotConfigured => e.to_string(),
        };
        AppError::new(e.kind(), message).with_internal(e.to_string())
    }
}

pub type FetchResult = Result<Vec<SearchResultItem>, FetchError>;

/// Where the remote query goes and how the filter is named on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchEndpoint {
    url: ValidatedUrl,
    filter_param: String,
}

impl SearchEndpoint {
    pub fn from_config(config: &SearchConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            url: config.endpoint_url()?,
            filter_param: config.filter_param.clone(),
        })
    }

    #[must_use]
    pub fn host(&self) -> &str {
        self.url.host()
    }

    #[must_use]
    pub fn query_url(&self, query: &SearchQuery) -> Url {
        self.url.with_query([
            ("lat", query.location.lat().to_string()),
            ("lng", query.location.lng().to_string()),
            (self.filter_param.as_str(), query.min_value.to_string()),
        ])
    }
}

/// Turns what the HTTP capability handed back into a batch of results.
///
/// Only a 200 counts as success, and one bad element fails the whole batch.
pub fn read_response(result: crux_http::Result<crux_http::Response<Vec<u8>>>) -> FetchResult {
    let mut response = result.map_err(|e| FetchError::Transport(e.to_string()))?;

    let code = u16::from(response.status());
    if code != 200 {
        warn!(status = code, "search endpoint rejected query");
        return Err(FetchError::Status { code });
    }

    let body = response.take_body().unwrap_or_default();
    let items = decode_results(&body).map_err(|e| FetchError::Malformed(e.to_string()))?;
    debug!(count = items.len(), "decoded search results");
    Ok(items)
}
