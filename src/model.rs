//! Wire records returned by the gallery API.
//!
//! Every field is optional: the API has been observed to omit or null out
//! nested structures, and rendering has to degrade rather than fail. Lists
//! that arrive as `null` deserialize as empty.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Record identifier; the API sends integers but string ids are tolerated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    Num(i64),
    Text(String),
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Id::Num(n) => write!(f, "{}", n),
            Id::Text(s) => f.write_str(s),
        }
    }
}

impl Id {
    /// Numeric when `raw` is an integer, textual otherwise
    pub fn parse(raw: &str) -> Self {
        raw.trim()
            .parse::<i64>()
            .map(Id::Num)
            .unwrap_or_else(|_| Id::Text(raw.to_string()))
    }
}

impl std::str::FromStr for Id {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Id::parse(s))
    }
}

impl From<i64> for Id {
    fn from(n: i64) -> Self {
        Id::Num(n)
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id::Text(s.to_string())
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Reference to a user embedded in another record.
///
/// Accepts either `{ "id": .., "username": .. }` or a bare username string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "UserRefRepr")]
pub struct UserRef {
    pub id: Option<Id>,
    pub username: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum UserRefRepr {
    Record {
        #[serde(default)]
        id: Option<Id>,
        #[serde(default)]
        username: Option<String>,
    },
    Name(String),
}

impl From<UserRefRepr> for UserRef {
    fn from(repr: UserRefRepr) -> Self {
        match repr {
            UserRefRepr::Record { id, username } => UserRef { id, username },
            UserRefRepr::Name(name) => UserRef { id: None, username: Some(name) },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    #[serde(default)]
    pub id: Option<Id>,
    #[serde(default, alias = "name_tag")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(default)]
    pub comment: Option<String>,
    /// Commenter; the API nests it as `username: { username }`
    #[serde(default, rename = "username")]
    pub author: Option<UserRef>,
}

/// One uploaded image with its metadata, tags and comments
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GalleryItem {
    #[serde(default)]
    pub id: Option<Id>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Vec<Tag>,
    #[serde(default, alias = "username")]
    pub owner: Option<UserRef>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(default)]
    pub id: Option<Id>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub number_of_images: Option<i64>,
    #[serde(default)]
    pub banned: Option<bool>,
}

/// Credentials returned by the login and refresh endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Body of `GET /api/images/qrcode/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QrPayload {
    pub base64_encoded_img: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gallery_item_reads_wire_names() {
        let json = r#"{
            "id": 7,
            "url": "https://cdn/x.png",
            "description": "sunset",
            "tags": [{"id": 1, "name_tag": "sky"}],
            "username": {"id": 3, "username": "mike"},
            "comments": [{"comment": "nice", "username": {"username": "ann"}}]
        }"#;
        let item: GalleryItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.id, Some(Id::Num(7)));
        assert_eq!(item.tags[0].name.as_deref(), Some("sky"));
        assert_eq!(item.owner.as_ref().unwrap().username.as_deref(), Some("mike"));
        let author = item.comments[0].author.as_ref().unwrap();
        assert_eq!(author.username.as_deref(), Some("ann"));
    }

    #[test]
    fn missing_and_null_fields_degrade() {
        let item: GalleryItem =
            serde_json::from_str(r#"{"tags": null, "comments": null, "owner": null}"#).unwrap();
        assert!(item.tags.is_empty());
        assert!(item.comments.is_empty());
        assert!(item.owner.is_none());
        assert!(item.url.is_none());

        let empty: GalleryItem = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, GalleryItem::default());
    }

    #[test]
    fn user_ref_accepts_bare_name() {
        let c: Comment = serde_json::from_str(r#"{"comment": "hi", "username": "bob"}"#).unwrap();
        assert_eq!(c.author.unwrap().username.as_deref(), Some("bob"));
    }

    #[test]
    fn ids_parse_numeric_first() {
        assert_eq!(Id::parse("42"), Id::Num(42));
        assert_eq!(Id::parse("abc"), Id::Text("abc".into()));
    }

    #[test]
    fn string_ids_are_tolerated() {
        let tag: Tag = serde_json::from_str(r#"{"id": "a1", "name": "x"}"#).unwrap();
        assert_eq!(tag.id.unwrap().to_string(), "a1");
    }

    #[test]
    fn token_pair_requires_both_tokens() {
        assert!(serde_json::from_str::<TokenPair>(r#"{"access_token": "a"}"#).is_err());
        let pair: TokenPair = serde_json::from_str(
            r#"{"access_token": "a", "refresh_token": "r", "token_type": "bearer"}"#,
        )
        .unwrap();
        assert_eq!(pair.refresh_token, "r");
    }
}
