//! Endpoints of the remote gallery API and typed calls over them.

use crate::fetch::{ApiClient, ApiRequest, Auth, CancelToken};
use crate::model::{GalleryItem, Id, QrPayload, TokenPair, UserRecord};
use crate::Result;
use std::fmt;

/// Consumed API endpoints
#[derive(Debug, Clone, PartialEq)]
pub enum Endpoint {
    /// `GET /api/images/`
    Images,
    /// `GET /api/images/tag/{tag_id}`
    ImagesByTag(Id),
    /// `GET /api/images/user/{user_id}`
    ImagesByUser(Id),
    /// `GET /api/images/qrcode/{id}`
    QrCode(Id),
    /// `GET /api/users/all_users`
    AllUsers,
    /// `GET /api/users/{username}`
    User(String),
    /// `GET /api/users/me/`
    Me,
    /// `POST /api/users/login`
    Login,
    /// `GET /api/users/refresh_token`
    RefreshToken,
    /// `POST /api/users/logout/`
    Logout,
}

impl Endpoint {
    /// Unencoded path segments; an empty trailing segment yields a trailing slash
    pub fn segments(&self) -> Vec<String> {
        match self {
            Endpoint::Images => path(&["api", "images", ""]),
            Endpoint::ImagesByTag(id) => path_with(&["api", "images", "tag"], id.to_string()),
            Endpoint::ImagesByUser(id) => path_with(&["api", "images", "user"], id.to_string()),
            Endpoint::QrCode(id) => path_with(&["api", "images", "qrcode"], id.to_string()),
            Endpoint::AllUsers => path(&["api", "users", "all_users"]),
            Endpoint::User(name) => path_with(&["api", "users"], name.clone()),
            Endpoint::Me => path(&["api", "users", "me", ""]),
            Endpoint::Login => path(&["api", "users", "login"]),
            Endpoint::RefreshToken => path(&["api", "users", "refresh_token"]),
            Endpoint::Logout => path(&["api", "users", "logout", ""]),
        }
    }
}

fn path(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|p| p.to_string()).collect()
}

fn path_with(prefix: &[&str], last: String) -> Vec<String> {
    let mut segments = path(prefix);
    segments.push(last);
    segments
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.segments().join("/"))
    }
}

/// Which slice of the gallery a listing page shows
#[derive(Debug, Clone, PartialEq)]
pub enum GalleryQuery {
    All,
    Tag(Id),
    User(Id),
}

impl GalleryQuery {
    pub fn endpoint(&self) -> Endpoint {
        match self {
            GalleryQuery::All => Endpoint::Images,
            GalleryQuery::Tag(id) => Endpoint::ImagesByTag(id.clone()),
            GalleryQuery::User(id) => Endpoint::ImagesByUser(id.clone()),
        }
    }
}

/// Typed wrapper over [`ApiClient`]
#[derive(Clone)]
pub struct GalleryApi {
    client: ApiClient,
}

impl GalleryApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn gallery(&self, query: &GalleryQuery, cancel: &CancelToken) -> Result<Vec<GalleryItem>> {
        self.client.execute_json(&ApiRequest::get(query.endpoint()), cancel)
    }

    pub fn images(&self, cancel: &CancelToken) -> Result<Vec<GalleryItem>> {
        self.gallery(&GalleryQuery::All, cancel)
    }

    pub fn images_by_tag(&self, tag_id: Id, cancel: &CancelToken) -> Result<Vec<GalleryItem>> {
        self.gallery(&GalleryQuery::Tag(tag_id), cancel)
    }

    pub fn images_by_user(&self, user_id: Id, cancel: &CancelToken) -> Result<Vec<GalleryItem>> {
        self.gallery(&GalleryQuery::User(user_id), cancel)
    }

    pub fn qr_code(&self, id: Id, cancel: &CancelToken) -> Result<QrPayload> {
        self.client.execute_json(&ApiRequest::get(Endpoint::QrCode(id)), cancel)
    }

    pub fn all_users(&self, cancel: &CancelToken) -> Result<Vec<UserRecord>> {
        self.client.execute_json(&ApiRequest::get(Endpoint::AllUsers), cancel)
    }

    pub fn user(&self, username: &str, cancel: &CancelToken) -> Result<UserRecord> {
        self.client
            .execute_json(&ApiRequest::get(Endpoint::User(username.to_string())), cancel)
    }

    pub fn me(&self, cancel: &CancelToken) -> Result<UserRecord> {
        self.client.execute_json(&ApiRequest::get(Endpoint::Me), cancel)
    }

    /// Exchange credentials for a token pair; sent without a bearer header.
    /// Only a 200 carries a token pair; any other status is a `Fetch` error.
    pub fn login(&self, username: &str, password: &str) -> Result<TokenPair> {
        let req = ApiRequest::post(Endpoint::Login)
            .form([("username", username), ("password", password)])
            .auth(Auth::Anonymous)
            .expect_status(200);
        self.client.execute_json(&req, &CancelToken::new())
    }

    /// Exchange a refresh token for a new pair
    pub fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
        let req = ApiRequest::get(Endpoint::RefreshToken).auth(Auth::Bearer(refresh_token.to_string()));
        self.client.execute_json(&req, &CancelToken::new())
    }

    pub fn logout(&self) -> Result<()> {
        self.client
            .execute(&ApiRequest::post(Endpoint::Logout), &CancelToken::new())
            .map(|_| ())
    }
}
