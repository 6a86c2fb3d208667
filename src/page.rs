//! Page lifecycle: `Idle → Fetching → {Rendered | Empty | Failed}`.
//!
//! A page performs one fetch, renders the result into a staging [`Frame`] and
//! only then swaps it in, so a failed fetch or decode leaves the visible
//! container exactly as it was. Failures and empty results are kept apart and
//! both produce a visible notice.

use crate::api::{GalleryApi, GalleryQuery};
use crate::dom::{Container, Element};
use crate::fetch::CancelToken;
use crate::model::Id;
use crate::qr::{self, ObjectUrl, ObjectUrlRegistry};
use crate::render::{render_into, render_user_info, Links, RenderContext};
use crate::{Error, Result};
use url::form_urlencoded;

#[derive(Debug, Clone, PartialEq)]
pub enum PageState {
    Idle,
    Fetching,
    Rendered { count: usize },
    /// The request succeeded but returned nothing to show
    Empty,
    /// The request or decode failed; carries the user-facing message
    Failed(String),
}

impl PageState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PageState::Rendered { .. } | PageState::Empty | PageState::Failed(_))
    }
}

/// Staging area a render step writes into
#[derive(Debug)]
pub struct Frame {
    pub container: Container,
    /// Temporary resources that live as long as the rendered content
    pub resources: Vec<ObjectUrl>,
}

#[derive(Debug)]
pub struct Page {
    title: String,
    container: Container,
    resources: Vec<ObjectUrl>,
    state: PageState,
    error: Option<Error>,
    cancel: CancelToken,
}

impl Page {
    pub fn new(title: &str, container_id: &str) -> Self {
        Self {
            title: title.to_string(),
            container: Container::new(container_id),
            resources: Vec::new(),
            state: PageState::Idle,
            error: None,
            cancel: CancelToken::new(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn state(&self) -> &PageState {
        &self.state
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn container_mut(&mut self) -> &mut Container {
        &mut self.container
    }

    /// The error behind a `Failed` state
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    pub fn resources(&self) -> &[ObjectUrl] {
        &self.resources
    }

    /// Handle that can cancel this page's fetch from elsewhere
    pub fn cancel_handle(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run the page's single fetch and render.
    ///
    /// `render` returns how many items it produced; zero yields `Empty`.
    /// Calling `load` on a page that has left `Idle` does nothing.
    pub fn load<R, F, G>(&mut self, fetch: F, render: G) -> &PageState
    where
        F: FnOnce(&CancelToken) -> Result<R>,
        G: FnOnce(&mut Frame, R) -> Result<usize>,
    {
        if self.state != PageState::Idle {
            log::warn!("{} page already loaded; reload to fetch again", self.title);
            return &self.state;
        }
        self.state = PageState::Fetching;

        let outcome = fetch(&self.cancel).and_then(|data| {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled(self.title.clone()));
            }
            let mut frame = Frame { container: Container::new(self.container.id()), resources: Vec::new() };
            let count = render(&mut frame, data)?;
            Ok((frame, count))
        });

        match outcome {
            Ok((frame, count)) => {
                self.container = frame.container;
                self.resources = frame.resources;
                self.state = if count == 0 { PageState::Empty } else { PageState::Rendered { count } };
            }
            Err(e) => {
                log::warn!("failed to load {}: {}", self.title, e);
                self.state = PageState::Failed(user_message(&e));
                self.error = Some(e);
            }
        }
        &self.state
    }

    /// Cancel any in-flight fetch and release temporary resources
    pub fn navigate_away(&mut self) {
        self.cancel.cancel();
        self.resources.clear();
    }

    /// Visible status line for non-rendered states
    pub fn notice(&self) -> Option<Element> {
        match &self.state {
            PageState::Idle => None,
            PageState::Rendered { .. } => None,
            PageState::Fetching => Some(Element::new("p").class("loading").text("Loading…")),
            PageState::Empty => Some(
                Element::new("p")
                    .class("empty")
                    .text(format!("No {} to show.", self.title)),
            ),
            PageState::Failed(msg) => Some(
                Element::new("div")
                    .class("error")
                    .attr("role", "alert")
                    .text(format!("Could not load {}: {}", self.title, msg)),
            ),
        }
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        if let Some(notice) = self.notice() {
            notice.write_html(&mut out);
        }
        out.push_str(&self.container.to_html());
        out
    }
}

fn user_message(err: &Error) -> String {
    match err {
        Error::Fetch { status: 401, .. } | Error::Fetch { status: 403, .. } => {
            "you are not signed in or your session has expired".into()
        }
        Error::Fetch { status: 404, .. } => "not found".into(),
        Error::Fetch { status, .. } => format!("the server responded with status {}", status),
        Error::Network(_) | Error::Timeout(_) => "the server could not be reached".into(),
        Error::Decode(_) => "the server sent data that could not be read".into(),
        Error::Cancelled(_) => "the request was cancelled".into(),
        other => other.to_string(),
    }
}

/// Parsed page query string
#[derive(Debug, Clone, Default)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    pub fn parse(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        Self(form_urlencoded::parse(query.as_bytes()).into_owned().collect())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    }

    pub fn require(&self, name: &str) -> Result<&str> {
        self.get(name)
            .ok_or_else(|| Error::Config(format!("missing query parameter `{}`", name)))
    }
}

/// The pages this client can show
#[derive(Debug, Clone, PartialEq)]
pub enum View {
    Gallery(GalleryQuery),
    Users,
    UserInfo(String),
    /// Profile of the signed-in user
    Me,
    Qr(Id),
}

impl View {
    /// Gallery filtered by `tag_id`
    pub fn tag_from_query(query: &str) -> Result<Self> {
        let q = QueryParams::parse(query);
        Ok(View::Gallery(GalleryQuery::Tag(Id::parse(q.require("tag_id")?))))
    }

    /// Gallery filtered by owner; reads `userId`
    pub fn user_images_from_query(query: &str) -> Result<Self> {
        let q = QueryParams::parse(query);
        Ok(View::Gallery(GalleryQuery::User(Id::parse(q.require("userId")?))))
    }

    /// Profile page; reads `username`
    pub fn user_info_from_query(query: &str) -> Result<Self> {
        let q = QueryParams::parse(query);
        Ok(View::UserInfo(q.require("username")?.to_string()))
    }

    /// QR view; reads `Id`
    pub fn qr_from_query(query: &str) -> Result<Self> {
        let q = QueryParams::parse(query);
        Ok(View::Qr(Id::parse(q.require("Id")?)))
    }

    pub fn title(&self) -> &'static str {
        match self {
            View::Gallery(_) => "images",
            View::Users => "users",
            View::UserInfo(_) | View::Me => "user",
            View::Qr(_) => "image",
        }
    }

    pub fn container_id(&self) -> &'static str {
        match self {
            View::Gallery(_) | View::Users => "content",
            View::UserInfo(_) | View::Me => "user-info",
            View::Qr(_) => "image-container",
        }
    }

    pub fn page(&self) -> Page {
        Page::new(self.title(), self.container_id())
    }

    /// Fetch and render this view into `page`
    pub fn load<'p>(
        &self,
        page: &'p mut Page,
        api: &GalleryApi,
        links: &Links,
        images: &ObjectUrlRegistry,
    ) -> &'p PageState {
        match self {
            View::Gallery(query) => {
                let ctx = match query {
                    GalleryQuery::All => RenderContext::gallery(links.clone()),
                    GalleryQuery::Tag(_) => RenderContext::tag(links.clone()),
                    GalleryQuery::User(_) => RenderContext::user(links.clone()),
                };
                page.load(
                    |cancel| api.gallery(query, cancel),
                    |frame, items| Ok(render_into(&mut frame.container, &items, &ctx)),
                )
            }
            View::Users => {
                let ctx = RenderContext::gallery(links.clone());
                page.load(
                    |cancel| api.all_users(cancel),
                    |frame, users| Ok(render_into(&mut frame.container, &users, &ctx)),
                )
            }
            View::UserInfo(username) => page.load(
                |cancel| api.user(username, cancel),
                |frame, user| {
                    frame.container.replace_children(render_user_info(&user));
                    Ok(1)
                },
            ),
            View::Me => page.load(
                |cancel| api.me(cancel),
                |frame, user| {
                    frame.container.replace_children(render_user_info(&user));
                    Ok(1)
                },
            ),
            View::Qr(id) => page.load(
                |cancel| api.qr_code(id.clone(), cancel),
                |frame, payload| {
                    let image = qr::decode_payload(&payload)?;
                    log::debug!("decoded {} byte {} image ({})", image.len(), image.mime, image.digest());
                    let url = images.create(image)?;
                    frame.container.replace_children(vec![qr::image_node(&url)]);
                    frame.resources.push(url);
                    Ok(1)
                },
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successful_load_renders_and_counts() {
        let mut page = Page::new("images", "content");
        let state = page.load(
            |_| Ok(vec!["a", "b"]),
            |frame, items| {
                for i in &items {
                    frame.container.append(Element::new("div").text(*i));
                }
                Ok(items.len())
            },
        );
        assert_eq!(state, &PageState::Rendered { count: 2 });
        assert_eq!(page.container().len(), 2);
        assert!(page.notice().is_none());
    }

    #[test]
    fn failed_fetch_leaves_container_untouched() {
        let mut page = Page::new("images", "content");
        page.container_mut().append(Element::new("div").text("before"));
        let before = page.container().clone();

        page.load(
            |_| -> Result<Vec<u8>> { Err(Error::Fetch { status: 500, endpoint: "/api/images/".into() }) },
            |_, _| panic!("render must not run"),
        );

        assert_eq!(page.container(), &before);
        assert!(matches!(page.state(), PageState::Failed(_)));
        assert_eq!(page.error().and_then(Error::status), Some(500));
        let html = page.to_html();
        assert!(html.contains("role=\"alert\""));
        assert!(html.contains("status 500"));
    }

    #[test]
    fn failed_render_leaves_container_untouched() {
        let mut page = Page::new("image", "image-container");
        page.container_mut().append(Element::new("p").text("keep"));
        page.load(
            |_| Ok(()),
            |frame, _| {
                frame.container.append(Element::new("p").text("partial"));
                Err(Error::Decode("bad".into()))
            },
        );
        assert_eq!(page.container().text_content(), "keep");
    }

    #[test]
    fn empty_result_is_distinct_from_failure() {
        let mut page = Page::new("images", "content");
        page.container_mut().append(Element::new("div"));
        page.load(|_| Ok(Vec::<u8>::new()), |_, _| Ok(0));
        assert_eq!(page.state(), &PageState::Empty);
        assert!(page.container().is_empty());
        assert!(page.to_html().contains("No images to show."));
    }

    #[test]
    fn load_runs_only_once() {
        let mut page = Page::new("images", "content");
        page.load(|_| Ok(()), |_, _| Ok(1));
        let mut fetched = false;
        page.load(
            |_| {
                fetched = true;
                Ok(())
            },
            |_, _| Ok(5),
        );
        assert!(!fetched);
        assert_eq!(page.state(), &PageState::Rendered { count: 1 });
    }

    #[test]
    fn cancelled_page_does_not_render() {
        let mut page = Page::new("images", "content");
        let handle = page.cancel_handle();
        page.load(
            |_| {
                handle.cancel();
                Ok(())
            },
            |_, _| panic!("render must not run"),
        );
        assert!(matches!(page.error(), Some(Error::Cancelled(_))));
        assert!(page.container().is_empty());
    }

    #[test]
    fn navigate_away_releases_resources() {
        let registry = ObjectUrlRegistry::new();
        let mut page = Page::new("image", "image-container");
        page.load(
            |_| Ok(qr::DecodedImage::new(vec![1, 2])),
            |frame, img| {
                let url = registry.create(img)?;
                frame.resources.push(url);
                Ok(1)
            },
        );
        assert_eq!(registry.live_count(), 1);
        page.navigate_away();
        assert_eq!(registry.live_count(), 0);
        assert!(page.cancel_handle().is_cancelled());
    }

    #[test]
    fn failed_page_result_can_be_unwrapped() {
        let res: Result<Page> = Err(Error::Timeout(100));
        assert!(matches!(res.unwrap_err(), Error::Timeout(100)));

        let page = Page::new("images", "content");
        let ok: Result<Page> = Ok(page);
        let dump = format!("{:?}", ok.unwrap());
        assert!(dump.contains("Idle"));
        assert!(dump.contains("content"));
    }

    #[test]
    fn views_read_their_query_parameters() {
        assert_eq!(
            View::tag_from_query("?tag_id=4").unwrap(),
            View::Gallery(GalleryQuery::Tag(Id::Num(4)))
        );
        assert_eq!(
            View::user_images_from_query("username=mike&userId=9").unwrap(),
            View::Gallery(GalleryQuery::User(Id::Num(9)))
        );
        assert_eq!(View::user_info_from_query("username=a%20b").unwrap(), View::UserInfo("a b".into()));
        assert_eq!(View::qr_from_query("Id=12").unwrap(), View::Qr(Id::Num(12)));
        assert!(matches!(View::qr_from_query("id=12"), Err(Error::Config(_))));
        assert!(matches!(View::tag_from_query("tag_id="), Err(Error::Config(_))));
    }
}
