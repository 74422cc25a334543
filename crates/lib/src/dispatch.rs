//! Command dispatch: map an inbound text event to a reply.
//!
//! Matching is exact and case-sensitive over a fixed command set; anything
//! else is echoed back. Each dispatch is a pure function of the event plus
//! the reply call (and, for profile/bye, one extra platform call) against
//! the messaging client. No state is carried between events.

use crate::channels::{
    Action, CarouselColumn, ImagemapAction, ImagemapArea, ImagemapBaseSize, LineError, Message,
    MessageContent, MessageEvent, MessagingClient, Source, Template,
};
use std::sync::Arc;

/// Longest text the platform accepts in a single text message.
const MAX_TEXT_LEN: usize = 1000;
/// Marker appended when a text is clipped to the platform limit.
const ELLIPSIS: &str = "……";

/// The fixed commands the bot understands. Anything else is `Echo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Profile,
    Bye,
    Confirm,
    Buttons,
    Carousel,
    Imagemap,
    Echo,
}

impl Command {
    pub fn parse(text: &str) -> Self {
        match text {
            "profile" => Command::Profile,
            "bye" => Command::Bye,
            "confirm" => Command::Confirm,
            "buttons" => Command::Buttons,
            "carousel" => Command::Carousel,
            "imagemap" => Command::Imagemap,
            _ => Command::Echo,
        }
    }
}

/// Send one or more messages against a reply token. The token must be
/// non-empty; the platform accepts each token exactly once.
pub async fn reply(
    client: &dyn MessagingClient,
    reply_token: &str,
    messages: Vec<Message>,
) -> Result<(), LineError> {
    if reply_token.is_empty() {
        return Err(LineError::EmptyReplyToken);
    }
    client.reply_message(reply_token, messages).await
}

/// Reply with a single text message, clipped to the platform limit.
pub async fn reply_text(
    client: &dyn MessagingClient,
    reply_token: &str,
    text: &str,
) -> Result<(), LineError> {
    reply(client, reply_token, vec![Message::text(truncate_text(text))]).await
}

/// Clip to the platform limit: inputs over `MAX_TEXT_LEN` chars keep the
/// first `MAX_TEXT_LEN - 2` and end with the ellipsis marker.
pub fn truncate_text(text: &str) -> String {
    if text.chars().count() <= MAX_TEXT_LEN {
        return text.to_string();
    }
    let mut out: String = text.chars().take(MAX_TEXT_LEN - 2).collect();
    out.push_str(ELLIPSIS);
    out
}

/// Maps inbound text events to replies against the messaging client.
pub struct Dispatcher {
    client: Arc<dyn MessagingClient>,
    /// Base URL the static template assets are served under.
    static_base_url: String,
}

impl Dispatcher {
    pub fn new(client: Arc<dyn MessagingClient>, static_base_url: impl Into<String>) -> Self {
        let static_base_url = static_base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            static_base_url,
        }
    }

    fn static_url(&self, path: &str) -> String {
        format!("{}{}", self.static_base_url, path)
    }

    /// Handle one inbound event. Non-text messages are ignored.
    pub async fn dispatch(&self, event: &MessageEvent) -> Result<(), LineError> {
        let MessageContent::Text { ref text } = event.message else {
            log::debug!("ignoring non-text message event");
            return Ok(());
        };
        match Command::parse(text) {
            Command::Profile => self.handle_profile(event).await,
            Command::Bye => self.handle_bye(event).await,
            Command::Confirm => self.handle_confirm(event).await,
            Command::Buttons => self.handle_buttons(event).await,
            Command::Carousel => self.handle_carousel(event).await,
            Command::Imagemap => self.handle_imagemap(event).await,
            Command::Echo => reply_text(self.client.as_ref(), &event.reply_token, text).await,
        }
    }

    /// Fetch the sender's profile and reply from the continuation, so the
    /// webhook invocation is not held up by the profile API. Fetch failures
    /// are rendered as a text reply instead of propagating.
    async fn handle_profile(&self, event: &MessageEvent) -> Result<(), LineError> {
        let Some(user_id) = event.source.user_id() else {
            return reply_text(
                self.client.as_ref(),
                &event.reply_token,
                "Bot can't use profile API without user ID",
            )
            .await;
        };
        let client = self.client.clone();
        let user_id = user_id.to_string();
        let reply_token = event.reply_token.clone();
        tokio::spawn(async move {
            let result = match client.get_profile(&user_id).await {
                Ok(profile) => {
                    reply(
                        client.as_ref(),
                        &reply_token,
                        vec![
                            Message::text(format!("Display name: {}", profile.display_name)),
                            Message::text(format!("Status message: {}", profile.status_message)),
                        ],
                    )
                    .await
                }
                Err(e) => reply_text(client.as_ref(), &reply_token, &e.to_string()).await,
            };
            if let Err(e) = result {
                log::warn!("profile reply failed: {}", e);
            }
        });
        Ok(())
    }

    /// Leave the group or room after confirming; leaving a 1:1 chat is not possible.
    async fn handle_bye(&self, event: &MessageEvent) -> Result<(), LineError> {
        match event.source {
            Source::Group { ref group_id, .. } => {
                reply_text(self.client.as_ref(), &event.reply_token, "Leaving group").await?;
                self.client.leave_group(group_id).await
            }
            Source::Room { ref room_id, .. } => {
                reply_text(self.client.as_ref(), &event.reply_token, "Leaving room").await?;
                self.client.leave_room(room_id).await
            }
            Source::User { .. } => {
                reply_text(
                    self.client.as_ref(),
                    &event.reply_token,
                    "Bot can't leave from 1:1 chat",
                )
                .await
            }
        }
    }

    async fn handle_confirm(&self, event: &MessageEvent) -> Result<(), LineError> {
        let template = Template::Confirm {
            text: "Do it?".to_string(),
            actions: vec![Action::message("Yes", "Yes!"), Action::message("No", "No!")],
        };
        reply(
            self.client.as_ref(),
            &event.reply_token,
            vec![Message::template("Confirm alt text", template)],
        )
        .await
    }

    async fn handle_buttons(&self, event: &MessageEvent) -> Result<(), LineError> {
        let template = Template::Buttons {
            thumbnail_image_url: self.static_url("/static/buttons/1040.jpg"),
            title: "My button sample".to_string(),
            text: "Hello, my button".to_string(),
            actions: vec![
                Action::uri("Go to line.me", "https://line.me"),
                Action::postback("Say hello1", "hello こんにちは"),
                Action::postback_with_display("言 hello2", "hello こんにちは", "hello こんにちは"),
                Action::message("Say message", "Rice=米"),
            ],
        };
        reply(
            self.client.as_ref(),
            &event.reply_token,
            vec![Message::template("Button alt text", template)],
        )
        .await
    }

    async fn handle_carousel(&self, event: &MessageEvent) -> Result<(), LineError> {
        let image_url = self.static_url("/static/buttons/1040.jpg");
        let template = Template::Carousel {
            columns: vec![
                CarouselColumn {
                    thumbnail_image_url: image_url.clone(),
                    title: "hoge".to_string(),
                    text: "fuga".to_string(),
                    actions: vec![
                        Action::uri("Go to line.me", "https://line.me"),
                        Action::postback("Say hello1", "hello こんにちは"),
                    ],
                },
                CarouselColumn {
                    thumbnail_image_url: image_url,
                    title: "hoge".to_string(),
                    text: "fuga".to_string(),
                    actions: vec![
                        Action::postback_with_display(
                            "言 hello2",
                            "hello こんにちは",
                            "hello こんにちは",
                        ),
                        Action::message("Say message", "Rice=米"),
                    ],
                },
            ],
        };
        reply(
            self.client.as_ref(),
            &event.reply_token,
            vec![Message::template("Carousel alt text", template)],
        )
        .await
    }

    async fn handle_imagemap(&self, event: &MessageEvent) -> Result<(), LineError> {
        let message = Message::Imagemap {
            base_url: self.static_url("/static/rich"),
            alt_text: "This is alt text".to_string(),
            base_size: ImagemapBaseSize {
                width: 1040,
                height: 1040,
            },
            actions: vec![
                ImagemapAction::uri(
                    "https://store.line.me/family/manga/en",
                    ImagemapArea::new(0, 0, 520, 520),
                ),
                ImagemapAction::uri(
                    "https://store.line.me/family/music/en",
                    ImagemapArea::new(520, 0, 520, 520),
                ),
                ImagemapAction::uri(
                    "https://store.line.me/family/play/en",
                    ImagemapArea::new(0, 520, 520, 520),
                ),
                ImagemapAction::message("URANAI!", ImagemapArea::new(520, 520, 520, 520)),
            ],
        };
        reply(self.client.as_ref(), &event.reply_token, vec![message]).await
    }
}
