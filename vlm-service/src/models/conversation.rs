//! Conversation payload handed to the model backend.
//!
//! A conversation is built fresh for every request and dropped with it.
//! Backends are responsible for chat templating and for appending the
//! assistant generation prompt.

use image::RgbImage;

/// Speaker of a message. Requests only ever carry user turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
        }
    }
}

/// One item of a message's content.
#[derive(Debug, Clone)]
pub enum ContentItem {
    Text { text: String },
    /// Already decoded and normalised to three-channel RGB.
    Image { image: RgbImage },
}

#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentItem>,
}

#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// Single user turn containing only `prompt`.
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message {
                role: Role::User,
                content: vec![ContentItem::Text {
                    text: prompt.into(),
                }],
            }],
        }
    }

    /// Single user turn: the image first, then the question about it.
    pub fn from_image_question(image: RgbImage, question: impl Into<String>) -> Self {
        Self {
            messages: vec![Message {
                role: Role::User,
                content: vec![
                    ContentItem::Image { image },
                    ContentItem::Text {
                        text: question.into(),
                    },
                ],
            }],
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// All text items joined with newlines, in order.
    pub fn prompt_text(&self) -> String {
        self.messages
            .iter()
            .flat_map(|m| m.content.iter())
            .filter_map(|item| match item {
                ContentItem::Text { text } => Some(text.as_str()),
                ContentItem::Image { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn images(&self) -> impl Iterator<Item = &RgbImage> {
        self.messages
            .iter()
            .flat_map(|m| m.content.iter())
            .filter_map(|item| match item {
                ContentItem::Image { image } => Some(image),
                ContentItem::Text { .. } => None,
            })
    }
}
