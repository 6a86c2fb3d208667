//! Render pipeline: records in, element trees out.
//!
//! Rendering is independent of any hosting page. A page picks a
//! [`RenderContext`] and hands records to [`render_into`], which replaces the
//! container's children with one card per record in API order.

use crate::dom::{Container, Element, Node};
use crate::model::{Comment, GalleryItem, Id, Tag, UserRecord, UserRef};
use url::form_urlencoded;

/// Builds links to the other gallery pages
#[derive(Debug, Clone)]
pub struct Links {
    prefix: String,
}

impl Default for Links {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Links {
    /// `prefix` is prepended to page names, e.g. `/` or `http://host/app/`
    pub fn new(prefix: &str) -> Self {
        let mut prefix = prefix.to_string();
        if !prefix.ends_with('/') {
            prefix.push('/');
        }
        Self { prefix }
    }

    fn page(&self, name: &str, query: &[(&str, String)]) -> String {
        let mut ser = form_urlencoded::Serializer::new(String::new());
        for (k, v) in query {
            ser.append_pair(k, v);
        }
        format!("{}{}?{}", self.prefix, name, ser.finish())
    }

    pub fn user(&self, username: &str, user_id: Option<&Id>) -> String {
        let mut q = vec![("username", username.to_string())];
        if let Some(id) = user_id {
            q.push(("userId", id.to_string()));
        }
        self.page("user.html", &q)
    }

    pub fn tag(&self, tag_id: &Id) -> String {
        self.page("images_by_tag.html", &[("tag_id", tag_id.to_string())])
    }

    pub fn qr(&self, item_id: &Id) -> String {
        self.page("get_qr.html", &[("Id", item_id.to_string())])
    }
}

/// Per-page rendering switches
#[derive(Debug, Clone)]
pub struct RenderContext {
    pub links: Links,
    /// Show the owner link at the top of each card
    pub show_owner: bool,
    /// Wrap the image in a link to its QR view
    pub link_image_to_qr: bool,
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::gallery(Links::default())
    }
}

impl RenderContext {
    /// Landing gallery: owner shown, images link to their QR view
    pub fn gallery(links: Links) -> Self {
        Self { links, show_owner: true, link_image_to_qr: true }
    }

    /// Tag-filtered gallery
    pub fn tag(links: Links) -> Self {
        Self { links, show_owner: false, link_image_to_qr: false }
    }

    /// Owner-filtered gallery
    pub fn user(links: Links) -> Self {
        Self { links, show_owner: true, link_image_to_qr: false }
    }
}

/// Turn a record into a card
pub trait Render {
    fn render(&self, ctx: &RenderContext) -> Element;
}

impl Render for GalleryItem {
    fn render(&self, ctx: &RenderContext) -> Element {
        let mut card = Element::new("div").class("image-card");
        if let Some(id) = &self.id {
            card = card.attr("data-id", &id.to_string());
        }

        if ctx.show_owner {
            if let Some(owner) = self.owner.as_ref().and_then(|o| user_link(o, &ctx.links)) {
                card = card.child(Element::new("p").class("owner").child(owner));
            }
        }

        if let Some(url) = self.url.as_deref().filter(|u| !u.is_empty()) {
            let img = Element::new("img")
                .attr("src", url)
                .attr("alt", self.description.as_deref().unwrap_or_default());
            card = match (&self.id, ctx.link_image_to_qr) {
                (Some(id), true) => card.child(Element::new("a").attr("href", &ctx.links.qr(id)).child(img)),
                _ => card.child(img),
            };
        }

        if let Some(desc) = self.description.as_deref().filter(|d| !d.is_empty()) {
            card = card.child(Element::new("p").class("description").text(desc));
        }

        if !self.tags.is_empty() {
            let mut p = Element::new("p").class("tags").text("Tags: ");
            for (i, tag) in self.tags.iter().enumerate() {
                if i > 0 {
                    p = p.text(", ");
                }
                p = p.child(render_tag(tag, &ctx.links));
            }
            card = card.child(p);
        }

        let comments = self.comments.iter().map(|c| Node::from(render_comment(c, &ctx.links)));
        card.child(Element::new("div").class("comments-container").children(comments))
    }
}

impl Render for UserRecord {
    fn render(&self, ctx: &RenderContext) -> Element {
        let name = self.username.as_deref().unwrap_or_default();
        let heading = if name.is_empty() {
            Element::new("h1")
        } else {
            Element::new("h1").child(
                Element::new("a")
                    .attr("href", &ctx.links.user(name, self.id.as_ref()))
                    .text(name),
            )
        };
        Element::new("div")
            .class("user-card")
            .child(heading)
            .child(Element::new("p").text(format!("Email: {}", self.email.as_deref().unwrap_or_default())))
            .child(Element::new("p").text(format!("ID: {}", display_opt(self.id.as_ref()))))
            .child(Element::new("p").text(format!(
                "Created At: {}",
                self.created_at.as_deref().unwrap_or_default()
            )))
    }
}

fn display_opt<T: ToString>(v: Option<&T>) -> String {
    v.map(ToString::to_string).unwrap_or_default()
}

fn user_link(user: &UserRef, links: &Links) -> Option<Element> {
    let name = user.username.as_deref().filter(|n| !n.is_empty())?;
    Some(
        Element::new("a")
            .class("user-link")
            .attr("href", &links.user(name, user.id.as_ref()))
            .text(name),
    )
}

fn render_tag(tag: &Tag, links: &Links) -> Node {
    let name = match (tag.name.as_deref(), &tag.id) {
        (Some(n), _) if !n.is_empty() => n.to_string(),
        (_, Some(id)) => format!("#{}", id),
        _ => String::new(),
    };
    match &tag.id {
        Some(id) => Element::new("a")
            .class("tag")
            .attr("href", &links.tag(id))
            .attr("data-tag-id", &id.to_string())
            .text(name)
            .into(),
        None => Element::new("span").class("tag").text(name).into(),
    }
}

fn render_comment(comment: &Comment, links: &Links) -> Element {
    let mut p = Element::new("p");
    match comment.author.as_ref().and_then(|a| user_link(a, links)) {
        Some(link) => {
            let name = link.text_content();
            let link = Element { children: vec![Node::text(format!("{}:", name))], ..link };
            p = p.child(link).text(" ");
        }
        None => p = p.child(Element::new("span").class("comment-author")),
    }
    p = p.child(
        Element::new("span")
            .class("comment-text")
            .text(comment.comment.as_deref().unwrap_or_default()),
    );
    Element::new("div").class("comment-card").child(p)
}

/// Replace `container`'s children with one card per record, preserving order.
///
/// Returns the number of cards rendered.
pub fn render_into<T: Render>(container: &mut Container, records: &[T], ctx: &RenderContext) -> usize {
    container.replace_children(records.iter().map(|r| Node::from(r.render(ctx))));
    container.len()
}

/// The labelled panel shown on a single user's page
pub fn render_user_info(user: &UserRecord) -> Vec<Node> {
    let row = |label: &str, value: String| -> Node {
        Element::new("p")
            .child(Element::new("span").class("info-label").text(label))
            .text(" ")
            .child(Element::new("span").class("info-value").text(value))
            .into()
    };
    vec![
        Element::new("h1").text("User Info").into(),
        row("User ID:", display_opt(user.id.as_ref())),
        row("Username:", user.username.clone().unwrap_or_default()),
        row("Email:", user.email.clone().unwrap_or_default()),
        row("Created At:", user.created_at.clone().unwrap_or_default()),
        row("Role:", user.role.clone().unwrap_or_default()),
        row("Number of Images:", display_opt(user.number_of_images.as_ref())),
        row("Is Banned:", display_opt(user.banned.as_ref())),
    ]
}
