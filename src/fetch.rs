//! Authenticated fetch helper.
//!
//! One request, no retries. The bearer token is pulled from the [`Session`]
//! each time a request is built, and the outcome is classified into the
//! crate's error taxonomy: transport problems become `Network`/`Timeout`,
//! non-2xx statuses become `Fetch`, and unparseable bodies become `Decode`.

use crate::api::Endpoint;
use crate::storage::Session;
use crate::{ClientConfig, Error, Result};
use reqwest::blocking::Client;
use reqwest::Method;
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Shared flag used to abandon a request when its page goes away.
///
/// The blocking client cannot abort a request mid-flight, so the flag is
/// checked before sending and again once the response is in; a response that
/// arrives after cancellation is discarded.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Request payload
#[derive(Debug, Clone)]
pub enum RequestBody {
    /// Sent as `application/x-www-form-urlencoded`
    Form(Vec<(String, String)>),
}

/// Which credential goes into the `Authorization` header
#[derive(Debug, Clone, PartialEq)]
pub enum Auth {
    /// The session's current access token, if any
    Session,
    /// An explicit bearer token (used for refresh-token exchange)
    Bearer(String),
    /// No `Authorization` header
    Anonymous,
}

/// A single API call
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub endpoint: Endpoint,
    pub body: Option<RequestBody>,
    pub auth: Auth,
    /// Exact status that counts as success; any 2xx when unset
    pub expect_status: Option<u16>,
}

impl ApiRequest {
    pub fn get(endpoint: Endpoint) -> Self {
        Self { method: Method::GET, endpoint, body: None, auth: Auth::Session, expect_status: None }
    }

    pub fn post(endpoint: Endpoint) -> Self {
        Self { method: Method::POST, endpoint, body: None, auth: Auth::Session, expect_status: None }
    }

    pub fn form<K, V>(mut self, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let pairs = fields.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self.body = Some(RequestBody::Form(pairs));
        self
    }

    pub fn auth(mut self, auth: Auth) -> Self {
        self.auth = auth;
        self
    }

    pub fn expect_status(mut self, status: u16) -> Self {
        self.expect_status = Some(status);
        self
    }

    fn accepts(&self, status: reqwest::StatusCode) -> bool {
        match self.expect_status {
            Some(code) => status.as_u16() == code,
            None => status.is_success(),
        }
    }
}

/// HTTP client bound to one API base URL and one session
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    config: ClientConfig,
    base: Url,
    session: Session,
}

impl ApiClient {
    pub fn new(config: ClientConfig, session: Session) -> Result<Self> {
        config.validate()?;
        let base = Url::parse(&config.base_url)
            .map_err(|e| Error::Config(format!("invalid base URL {}: {}", config.base_url, e)))?;

        let mut headers = reqwest::header::HeaderMap::new();
        for (k, v) in &config.headers {
            let name = reqwest::header::HeaderName::from_bytes(k.as_bytes())
                .map_err(|e| Error::Config(format!("invalid header name {}: {}", k, e)))?;
            let value = reqwest::header::HeaderValue::from_str(v)
                .map_err(|e| Error::Config(format!("invalid value for header {}: {}", k, e)))?;
            headers.insert(name, value);
        }

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config, base, session })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Absolute URL for an endpoint under the configured base
    pub fn url_for(&self, endpoint: &Endpoint) -> Result<Url> {
        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| Error::Config(format!("base URL {} cannot carry a path", self.base)))?;
            segments.pop_if_empty();
            segments.extend(endpoint.segments());
        }
        Ok(url)
    }

    /// Send the request and return the raw body of a 2xx response
    pub fn execute(&self, request: &ApiRequest, cancel: &CancelToken) -> Result<Vec<u8>> {
        let url = self.url_for(&request.endpoint)?;
        let endpoint = url.path().to_string();

        if cancel.is_cancelled() {
            return Err(Error::Cancelled(endpoint));
        }

        let mut builder = self.client.request(request.method.clone(), url);
        let token = match &request.auth {
            Auth::Session => self.session.access_token()?,
            Auth::Bearer(t) => Some(t.clone()),
            Auth::Anonymous => None,
        };
        match token {
            Some(t) => builder = builder.bearer_auth(t),
            None if request.auth == Auth::Session => {
                log::debug!("no access token stored; sending {} unauthenticated", endpoint)
            }
            None => {}
        }
        if let Some(RequestBody::Form(fields)) = &request.body {
            builder = builder.form(fields);
        }

        log::debug!("{} {}", request.method, endpoint);
        let res = builder.send().map_err(|e| self.transport_error(&endpoint, e))?;

        if cancel.is_cancelled() {
            log::debug!("discarding response for {}: page navigated away", endpoint);
            return Err(Error::Cancelled(endpoint));
        }

        let status = res.status();
        if !request.accepts(status) {
            log::warn!("{} {} returned {}", request.method, endpoint, status);
            return Err(Error::Fetch { status: status.as_u16(), endpoint });
        }

        let body = res.bytes().map_err(|e| self.transport_error(&endpoint, e))?;
        Ok(body.to_vec())
    }

    /// Send the request and decode the JSON body
    pub fn execute_json<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
        cancel: &CancelToken,
    ) -> Result<T> {
        let body = self.execute(request, cancel)?;
        serde_json::from_slice(&body).map_err(|e| {
            Error::Decode(format!("{}: {}", request.endpoint, e))
        })
    }

    fn transport_error(&self, endpoint: &str, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            log::warn!("{} timed out after {}ms", endpoint, self.config.timeout_ms);
            Error::Timeout(self.config.timeout_ms)
        } else {
            log::warn!("{} failed: {}", endpoint, err);
            Error::Network(format!("{}: {}", endpoint, err))
        }
    }
}
