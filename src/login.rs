//! Login, token refresh and logout.
//!
//! The login flow is the only writer of stored credentials besides refresh
//! and logout. A failed login stores nothing and does not navigate; the
//! typed error is handed back so the caller can show it.

use crate::api::GalleryApi;
use crate::dom::Element;
use crate::storage::Session;
use crate::{Error, Result};
use std::sync::Mutex;

/// Where the client goes after a state change
pub trait Navigator {
    fn navigate(&self, target: &str);
}

/// Navigator that only records targets, for headless use and tests
#[derive(Default)]
pub struct RecordingNavigator {
    visited: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visited(&self) -> Vec<String> {
        self.visited.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<String> {
        self.visited().pop()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, target: &str) {
        log::info!("navigating to {}", target);
        if let Ok(mut v) = self.visited.lock() {
            v.push(target.to_string());
        }
    }
}

/// Submitted login form contents
#[derive(Debug, Clone)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

impl LoginForm {
    pub fn new(username: &str, password: &str) -> Self {
        Self { username: username.to_string(), password: password.to_string() }
    }

    /// POST the credentials; on success persist both tokens and go to the
    /// landing page.
    pub fn submit(&self, api: &GalleryApi, session: &Session, navigator: &dyn Navigator) -> Result<()> {
        if self.username.trim().is_empty() || self.password.is_empty() {
            return Err(Error::Config("username and password are required".into()));
        }
        let tokens = api.login(&self.username, &self.password)?;
        session.store_tokens(&tokens)?;
        log::info!("signed in as {}", self.username);
        navigator.navigate(&api.client().config().landing_page);
        Ok(())
    }
}

/// Message shown under the login form after a failed submit
pub fn login_error_notice(err: &Error) -> Element {
    let msg = match err {
        Error::Fetch { status: 401, .. } | Error::Fetch { status: 400, .. } => {
            "Invalid username or password.".to_string()
        }
        Error::Fetch { status, .. } => format!("Login failed (status {}).", status),
        Error::Network(_) | Error::Timeout(_) => "The server could not be reached.".to_string(),
        Error::Decode(_) => "The server sent an unexpected response.".to_string(),
        other => other.to_string(),
    };
    Element::new("p").class("login-error").attr("role", "alert").text(msg)
}

/// Trade the stored refresh token for a new pair and store it
pub fn refresh(api: &GalleryApi, session: &Session) -> Result<()> {
    let token = session
        .refresh_token()?
        .ok_or_else(|| Error::Config("no refresh token stored; log in first".into()))?;
    let tokens = api.refresh(&token)?;
    session.store_tokens(&tokens)?;
    log::info!("session refreshed");
    Ok(())
}

/// Tell the server we are leaving, then drop local tokens regardless
pub fn logout(api: &GalleryApi, session: &Session) -> Result<()> {
    if session.access_token()?.is_some() {
        if let Err(e) = api.logout() {
            log::warn!("server-side logout failed: {}", e);
        }
    }
    session.clear()?;
    log::info!("signed out");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_navigator_keeps_history() {
        let nav = RecordingNavigator::new();
        assert_eq!(nav.last(), None);
        nav.navigate("a.html");
        nav.navigate("b.html");
        assert_eq!(nav.visited(), vec!["a.html", "b.html"]);
        assert_eq!(nav.last().as_deref(), Some("b.html"));
    }

    #[test]
    fn login_errors_are_user_readable() {
        let n = login_error_notice(&Error::Fetch { status: 401, endpoint: "/api/users/login".into() });
        assert_eq!(n.text_content(), "Invalid username or password.");
        assert_eq!(n.get_attr("role"), Some("alert"));
        let n = login_error_notice(&Error::Network("refused".into()));
        assert!(n.text_content().contains("could not be reached"));
    }
}
