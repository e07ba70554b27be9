use crate::config::Config;
use crate::error::Error;
use log::debug;
use reqwest::{header::AUTHORIZATION, Client, StatusCode, Url};
use serde_json::Value;

/// Resources exposed by the upstream analytics API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Platforms,
    Accounts,
    Fields,
    Insights,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Platforms => "platforms",
            Endpoint::Accounts => "accounts",
            Endpoint::Fields => "fields",
            Endpoint::Insights => "insights",
        }
    }
}

/// A single GET against the upstream API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub endpoint: Endpoint,
    pub params: Vec<(String, String)>,
}

impl Request {
    pub fn new(endpoint: Endpoint) -> Self {
        Request {
            endpoint,
            params: Vec::new(),
        }
    }

    pub fn param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.push((key.to_string(), value.into()));
        self
    }

    /// Returns the `page` parameter, or 1 when none was set.
    pub fn page(&self) -> u32 {
        self.params
            .iter()
            .find(|(key, _)| key == "page")
            .and_then(|(_, value)| value.parse().ok())
            .unwrap_or(1)
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Performs the request and returns the decoded JSON body.
    /// # Arguments
    /// * `request` - The endpoint and query parameters to send.
    /// # Returns
    /// The JSON envelope, or [`Error::UpstreamNotFound`] for a 404 so callers
    /// can decide whether a missing resource means "no data".
    async fn get(&self, request: Request) -> Result<Value, Error>;
}

#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Self {
        HttpTransport {
            client: Client::new(),
            base_url: config.api_url.to_string(),
            token: config.api_token.to_string(),
        }
    }

    fn build_url(&self, request: &Request) -> Result<Url, Error> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| Error::UrlParsingFailed(url::ParseError::SetHostOnCannotBeABaseUrl))?
            .pop_if_empty()
            .push(request.endpoint.path());

        {
            let mut query = url.query_pairs_mut();
            for (key, value) in &request.params {
                query.append_pair(key, value);
            }
            if !request.params.iter().any(|(key, _)| key == "page") {
                query.append_pair("page", "1");
            }
        }

        Ok(url)
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn get(&self, request: Request) -> Result<Value, Error> {
        let endpoint = request.endpoint.path();
        let url = self.build_url(&request)?;
        debug!("GET {} (page {})", endpoint, request.page());

        let resp = self
            .client
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .send()
            .await?;

        match resp.status() {
            status if status.is_success() => resp.json::<Value>().await.map_err(|err| {
                if err.is_decode() {
                    Error::format(endpoint, err.to_string())
                } else {
                    Error::UpstreamUnavailable(err)
                }
            }),
            StatusCode::NOT_FOUND => Err(Error::UpstreamNotFound {
                endpoint: endpoint.to_string(),
            }),
            status => Err(Error::UpstreamStatus {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            }),
        }
    }
}
