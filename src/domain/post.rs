//! Posts and their sections.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use super::record::{Entity, Record, RecordView, Stored, View};
use super::{Collection, RecordId};
use crate::error::GatewayError;

/// Name of the room reference field.
pub const ROOM_ID_FIELD: &str = "roomId";

/// Most posts returned by one listing.
pub const PAGE_SIZE: usize = 25;

/// One block of post content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PostSection {
    /// An uploaded file.
    Attachment {
        /// Section id.
        id: RecordId,
        /// Storage path of the file.
        path: String,
    },
    /// Plain text.
    Text {
        /// Section id.
        id: RecordId,
        /// Text content.
        body: String,
    },
}

impl PostSection {
    /// Builds a section from a client-supplied object, assigning a fresh id.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidArgument`] for unknown section types
    /// or missing content.
    pub fn from_draft(draft: &Value) -> Result<Self, GatewayError> {
        let text_field = |key: &str| draft.get(key).and_then(Value::as_str).map(str::to_string);
        match draft.get("type").and_then(Value::as_str) {
            Some("attachment") => text_field("path")
                .map(|path| Self::Attachment {
                    id: RecordId::new(),
                    path,
                })
                .ok_or_else(|| {
                    GatewayError::InvalidArgument("Invalid attachment post section".into())
                }),
            Some("text") => text_field("body")
                .map(|body| Self::Text {
                    id: RecordId::new(),
                    body,
                })
                .ok_or_else(|| GatewayError::InvalidArgument("Invalid text post section".into())),
            _ => Err(GatewayError::InvalidArgument(
                "Unsupported post section type".into(),
            )),
        }
    }
}

/// Post fields. The author is the record's creator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    /// Room the post belongs to.
    pub room_id: RecordId,
    /// Content, at least one section.
    pub sections: Vec<PostSection>,
}

impl Entity for Post {
    const COLLECTION: Collection = Collection::Posts;
    const NAME: &'static str = "Post";
}

impl Post {
    /// Creates a post by `author` in `room_id`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidArgument`] if there are no sections
    /// or any section is invalid.
    pub fn create(
        author: RecordId,
        room_id: RecordId,
        sections: &[Value],
    ) -> Result<Stored<Self>, GatewayError> {
        if sections.is_empty() {
            return Err(GatewayError::InvalidArgument("Invalid post sections".into()));
        }
        let sections = sections
            .iter()
            .map(PostSection::from_draft)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Stored {
            record: Record::new(author),
            fields: Self { room_id, sections },
        })
    }

    /// Client view.
    #[must_use]
    pub fn view(stored: &Stored<Self>) -> View<PostView> {
        stored.view_with(|s| PostView {
            record: s.record.view(),
            author_id: s.record.created_by,
            room_id: s.fields.room_id,
            sections: s.fields.sections.clone(),
        })
    }
}

/// Post as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    /// Record bookkeeping.
    #[serde(flatten)]
    pub record: RecordView,
    /// Author (the creator).
    pub author_id: RecordId,
    /// Room.
    pub room_id: RecordId,
    /// Content.
    pub sections: Vec<PostSection>,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sections_get_fresh_ids() {
        let drafts = [
            json!({ "type": "text", "body": "hello" }),
            json!({ "type": "attachment", "path": "img/1.png", "id": "ignored" }),
        ];
        let Ok(post) = Post::create(RecordId::new(), RecordId::new(), &drafts) else {
            panic!("post should be created");
        };
        let [PostSection::Text { id: a, body }, PostSection::Attachment { id: b, path }] =
            post.fields.sections.as_slice()
        else {
            panic!("unexpected sections: {:?}", post.fields.sections);
        };
        assert_ne!(a, b);
        assert_eq!(body, "hello");
        assert_eq!(path, "img/1.png");
    }

    #[test]
    fn rejects_bad_sections() {
        let author = RecordId::new();
        let room = RecordId::new();
        let cases = [
            (vec![], "Invalid post sections"),
            (vec![json!({ "type": "video" })], "Unsupported post section type"),
            (vec![json!({ "type": "text" })], "Invalid text post section"),
            (
                vec![json!({ "type": "attachment", "path": 7 })],
                "Invalid attachment post section",
            ),
        ];
        for (drafts, message) in cases {
            let Err(GatewayError::InvalidArgument(m)) = Post::create(author, room, &drafts) else {
                panic!("expected InvalidArgument for {drafts:?}");
            };
            assert_eq!(m, message);
        }
    }

    #[test]
    fn view_exposes_author() {
        let author = RecordId::new();
        let Ok(post) = Post::create(author, RecordId::new(), &[json!({ "type": "text", "body": "x" })])
        else {
            panic!("post should be created");
        };
        let Ok(json) = serde_json::to_value(Post::view(&post)) else {
            panic!("serialization failed");
        };
        assert_eq!(json.get("authorId"), Some(&json!(author.to_string())));
        assert_eq!(
            json.pointer("/sections/0/type"),
            Some(&serde_json::Value::from("text"))
        );
    }
}
