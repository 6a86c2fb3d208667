//! Margatsni gallery client
//!
//! A client for the Margatsni image gallery API that fetches JSON with a
//! bearer token from persistent storage and renders it into escaped HTML
//! element trees, one page at a time.
//!
//! # Features
//!
//! - **Authenticated fetch**: one request per page load, typed failures
//!   (`Network`, `Fetch`, `Decode`), request timeout and cancellation
//! - **Render pipeline**: structured element construction, API order kept,
//!   every nested field optional
//! - **Central token storage**: a single [`Session`] accessor over a
//!   pluggable [`storage::TokenStore`]
//!
//! # Example
//!
//! ```no_run
//! use margatsni::{ClientConfig, Session};
//! use margatsni::page::View;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig {
//!     base_url: "http://127.0.0.1:8000".to_string(),
//!     ..Default::default()
//! };
//! let api = margatsni::new_api(config, Session::in_memory())?;
//!
//! let view = View::Gallery(margatsni::api::GalleryQuery::All);
//! let mut page = view.page();
//! view.load(&mut page, &api, &Default::default(), &Default::default());
//! println!("{}", page.to_html());
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;

pub mod error;
pub use error::{Error, Result};

pub mod api;
pub mod dom;
pub mod fetch;
pub mod login;
pub mod model;
pub mod page;
pub mod qr;
pub mod render;
pub mod storage;

// Async facade over the blocking client
#[cfg(feature = "async")]
pub mod async_api;

pub use api::{Endpoint, GalleryApi, GalleryQuery};
pub use fetch::{ApiClient, CancelToken};
pub use model::{GalleryItem, Id, TokenPair, UserRecord};
pub use page::{Page, PageState, View};
pub use storage::Session;

#[cfg(feature = "async")]
pub use async_api::AsyncGallery;

/// Configuration for the API client
///
/// The defaults target a locally running API server.
///
/// # Examples
///
/// ```
/// let cfg = margatsni::ClientConfig::default();
/// assert_eq!(cfg.landing_page, "all_images.html");
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API origin; endpoint paths are appended to it
    pub base_url: String,
    /// User agent string to send with requests
    pub user_agent: String,
    /// Timeout for a whole request in milliseconds
    pub timeout_ms: u64,
    /// Page to navigate to after a successful login
    pub landing_page: String,
    /// Extra HTTP headers sent with every request
    pub headers: HashMap<String, String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            user_agent: format!("margatsni/{}", env!("CARGO_PKG_VERSION")),
            timeout_ms: 30000,
            landing_page: "all_images.html".to_string(),
            headers: HashMap::new(),
        }
    }
}

impl ClientConfig {
    /// Defaults overlaid with `MARGATSNI_BASE_URL`, `MARGATSNI_TIMEOUT_MS`
    /// and `MARGATSNI_LANDING_PAGE`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(url) = lookup("MARGATSNI_BASE_URL") {
            cfg.base_url = url;
        }
        if let Some(ms) = lookup("MARGATSNI_TIMEOUT_MS") {
            cfg.timeout_ms = ms
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("MARGATSNI_TIMEOUT_MS is not a number: {}", ms)))?;
        }
        if let Some(page) = lookup("MARGATSNI_LANDING_PAGE") {
            cfg.landing_page = page;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.base_url)
            .map_err(|e| Error::Config(format!("invalid base URL {}: {}", self.base_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config(format!("unsupported scheme in {}", self.base_url)));
        }
        if self.timeout_ms == 0 {
            return Err(Error::Config("timeout must be greater than zero".into()));
        }
        Ok(())
    }
}

/// Build a [`GalleryApi`] for the given configuration and session
pub fn new_api(config: ClientConfig, session: Session) -> Result<GalleryApi> {
    Ok(GalleryApi::new(ApiClient::new(config, session)?))
}
