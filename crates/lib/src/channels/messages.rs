//! Outbound message wire types: text, template (confirm/buttons/carousel),
//! and imagemap messages with their bound actions.
//!
//! These serialize to the platform's type-tagged JSON. Messages are built
//! fresh per reply and never mutated after construction.

use serde::Serialize;

/// A message the bot can send in a reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    Text {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    Template {
        alt_text: String,
        template: Template,
    },
    #[serde(rename_all = "camelCase")]
    Imagemap {
        base_url: String,
        alt_text: String,
        base_size: ImagemapBaseSize,
        actions: Vec<ImagemapAction>,
    },
}

impl Message {
    pub fn text(text: impl Into<String>) -> Self {
        Message::Text { text: text.into() }
    }

    pub fn template(alt_text: impl Into<String>, template: Template) -> Self {
        Message::Template {
            alt_text: alt_text.into(),
            template,
        }
    }
}

/// Structured template rendered by the platform inside a template message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Template {
    /// Two-choice dialog.
    Confirm { text: String, actions: Vec<Action> },
    /// Image, title, text, and up to 4 actions.
    #[serde(rename_all = "camelCase")]
    Buttons {
        thumbnail_image_url: String,
        title: String,
        text: String,
        actions: Vec<Action>,
    },
    /// Horizontally scrollable columns.
    Carousel { columns: Vec<CarouselColumn> },
}

/// One column of a carousel template.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CarouselColumn {
    pub thumbnail_image_url: String,
    pub title: String,
    pub text: String,
    pub actions: Vec<Action>,
}

/// User-triggerable control attached to a template element.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Action {
    /// Opens a link.
    Uri { label: String, uri: String },
    /// Sends the given text as the user's message.
    Message { label: String, text: String },
    /// Posts `data` back to the bot; `display_text` optionally echoes into the chat.
    #[serde(rename_all = "camelCase")]
    Postback {
        label: String,
        data: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        display_text: Option<String>,
    },
}

impl Action {
    pub fn uri(label: impl Into<String>, uri: impl Into<String>) -> Self {
        Action::Uri {
            label: label.into(),
            uri: uri.into(),
        }
    }

    pub fn message(label: impl Into<String>, text: impl Into<String>) -> Self {
        Action::Message {
            label: label.into(),
            text: text.into(),
        }
    }

    pub fn postback(label: impl Into<String>, data: impl Into<String>) -> Self {
        Action::Postback {
            label: label.into(),
            data: data.into(),
            display_text: None,
        }
    }

    pub fn postback_with_display(
        label: impl Into<String>,
        data: impl Into<String>,
        display_text: impl Into<String>,
    ) -> Self {
        Action::Postback {
            label: label.into(),
            data: data.into(),
            display_text: Some(display_text.into()),
        }
    }
}

/// Clickable region of an imagemap, mapped to a link or an outgoing message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ImagemapAction {
    #[serde(rename_all = "camelCase")]
    Uri { link_uri: String, area: ImagemapArea },
    Message { text: String, area: ImagemapArea },
}

impl ImagemapAction {
    pub fn uri(link_uri: impl Into<String>, area: ImagemapArea) -> Self {
        ImagemapAction::Uri {
            link_uri: link_uri.into(),
            area,
        }
    }

    pub fn message(text: impl Into<String>, area: ImagemapArea) -> Self {
        ImagemapAction::Message {
            text: text.into(),
            area,
        }
    }
}

/// Rectangle inside the imagemap canvas, in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImagemapArea {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl ImagemapArea {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Declared canvas size of the base image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImagemapBaseSize {
    pub width: u32,
    pub height: u32,
}
