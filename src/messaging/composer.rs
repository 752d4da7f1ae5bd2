//! Outbound message composition and dispatch
//!
//! Every send follows the same steps:
//!
//! 1. Look up the tenant and take its session lock
//! 2. Check the client is connected and logged in
//! 3. Show the composing indicator to the recipient
//! 4. Resolve the recipient (unregistered ids fail before any media work)
//! 5. Build the content, preprocessing and uploading media as needed
//! 6. Dispatch with a fresh message id
//! 7. Revert the composing indicator, on success and failure alike
//!
//! Media is never dispatched unless every upload it references succeeded.

use super::upload::upload;
use super::vcard::contact_card;
use crate::engine::message::{
    ActionLink, AudioMessage, ContactMessage, DocumentMessage, ImageMessage, LinkMessage,
    StickerMessage, VideoMessage,
};
use crate::engine::{
    ChatPresenceMedia, Engine, EngineClient, MediaCategory, Message, MessageId, OutboundMessage,
};
use crate::error::{SessionError, SessionResult};
use crate::identity;
use crate::media::{prepare_image, prepare_sticker, MediaAsset};
use crate::session::{with_composing, SessionManager};
use std::future::Future;
use std::sync::Arc;
use tracing::info;

/// Button title and matched text of a link without a caption
pub const DEFAULT_LINK_CAPTION: &str = "Open Link";

/// Run CPU-bound media work off the async workers
async fn blocking<T, F>(work: F) -> SessionResult<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(output) => Ok(output),
        Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
        Err(_) => Err(SessionError::Cancelled),
    }
}

/// Steps 4 to 6: resolve, build the content, dispatch
async fn resolve_and_dispatch<C, F, Fut>(
    client: Arc<C>,
    key: &str,
    to: &str,
    build: F,
) -> SessionResult<MessageId>
where
    C: EngineClient,
    F: FnOnce(Arc<C>) -> Fut,
    Fut: Future<Output = SessionResult<Message>>,
{
    let jid = identity::resolve(client.as_ref(), to)
        .await?
        .ok_or_else(|| SessionError::RecipientNotRegistered(to.to_string()))?;

    let content = build(Arc::clone(&client)).await?;
    let message = OutboundMessage::new(jid, content);
    client
        .send_message(&message)
        .await
        .map_err(SessionError::SendFailed)?;

    info!(
        tenant = %key,
        kind = %message.kind(),
        id = %message.id,
        recipient = %message.recipient,
        "message sent"
    );
    Ok(message.id)
}

/// Build a link preview message. Blank captions count as absent.
pub fn link_message(caption: Option<&str>, url: &str) -> LinkMessage {
    let (title, text) = match caption.filter(|c| !c.trim().is_empty()) {
        Some(caption) => (caption.to_string(), format!("{}\n{}", caption, url)),
        None => (DEFAULT_LINK_CAPTION.to_string(), url.to_string()),
    };

    LinkMessage {
        text,
        matched_text: title.clone(),
        canonical_url: url.to_string(),
        action_link: ActionLink {
            url: url.to_string(),
            button_title: title,
        },
    }
}

impl<E: Engine> SessionManager<E> {
    async fn compose_and_send<F, Fut>(
        &self,
        key: &str,
        to: &str,
        media: ChatPresenceMedia,
        build: F,
    ) -> SessionResult<MessageId>
    where
        F: FnOnce(Arc<E::Client>) -> Fut,
        Fut: Future<Output = SessionResult<Message>>,
    {
        let session = self.lock_live(key).await?;
        session.ensure_ready()?;

        let client = Arc::clone(session.client());
        let recipient = identity::compose(to);

        with_composing(
            Arc::clone(&client),
            recipient,
            media,
            resolve_and_dispatch(client, key, to, build),
        )
        .await
    }

    pub async fn send_text(&self, key: &str, to: &str, body: &str) -> SessionResult<MessageId> {
        self.compose_and_send(key, to, ChatPresenceMedia::Text, |_| async move {
            Ok(Message::Text {
                body: body.to_string(),
            })
        })
        .await
    }

    pub async fn send_location(
        &self,
        key: &str,
        to: &str,
        latitude: f64,
        longitude: f64,
    ) -> SessionResult<MessageId> {
        self.compose_and_send(key, to, ChatPresenceMedia::Text, |_| async move {
            Ok(Message::Location {
                latitude,
                longitude,
            })
        })
        .await
    }

    /// Send a file as a document; its title is the file name
    pub async fn send_document(
        &self,
        key: &str,
        to: &str,
        bytes: Vec<u8>,
        mimetype: &str,
        file_name: &str,
    ) -> SessionResult<MessageId> {
        self.compose_and_send(key, to, ChatPresenceMedia::Text, |client| async move {
            let media = upload(client.as_ref(), &bytes, MediaCategory::Document).await?;
            Ok(Message::Document(DocumentMessage {
                media,
                mimetype: mimetype.to_string(),
                title: file_name.to_string(),
                file_name: file_name.to_string(),
            }))
        })
        .await
    }

    /// Send an image with a JPEG thumbnail.
    ///
    /// Conversion and compression follow the `[media]` configuration.
    pub async fn send_image(
        &self,
        key: &str,
        to: &str,
        bytes: Vec<u8>,
        mimetype: &str,
        caption: Option<&str>,
        view_once: bool,
    ) -> SessionResult<MessageId> {
        let config = self.config().media;
        let asset = MediaAsset::new(bytes, mimetype);

        self.compose_and_send(key, to, ChatPresenceMedia::Text, |client| async move {
            let prepared = blocking(move || prepare_image(asset, &config)).await??;

            let media = upload(client.as_ref(), &prepared.image.bytes, MediaCategory::Image).await?;
            let thumbnail = upload(
                client.as_ref(),
                &prepared.thumbnail.bytes,
                MediaCategory::ImageThumbnail,
            )
            .await?;

            Ok(Message::Image(ImageMessage {
                media,
                mimetype: prepared.image.mime,
                caption: caption.map(str::to_string),
                jpeg_thumbnail: prepared.thumbnail.bytes,
                thumbnail,
                view_once,
            }))
        })
        .await
    }

    /// Send an audio clip; the recipient sees a recording indicator
    pub async fn send_audio(
        &self,
        key: &str,
        to: &str,
        bytes: Vec<u8>,
        mimetype: &str,
    ) -> SessionResult<MessageId> {
        self.compose_and_send(key, to, ChatPresenceMedia::Audio, |client| async move {
            let media = upload(client.as_ref(), &bytes, MediaCategory::Audio).await?;
            Ok(Message::Audio(AudioMessage {
                media,
                mimetype: mimetype.to_string(),
            }))
        })
        .await
    }

    pub async fn send_video(
        &self,
        key: &str,
        to: &str,
        bytes: Vec<u8>,
        mimetype: &str,
        caption: Option<&str>,
        view_once: bool,
    ) -> SessionResult<MessageId> {
        self.compose_and_send(key, to, ChatPresenceMedia::Text, |client| async move {
            let media = upload(client.as_ref(), &bytes, MediaCategory::Video).await?;
            Ok(Message::Video(VideoMessage {
                media,
                mimetype: mimetype.to_string(),
                caption: caption.map(str::to_string),
                view_once,
            }))
        })
        .await
    }

    /// Share a contact card for `name` with phone `number`
    pub async fn send_contact(
        &self,
        key: &str,
        to: &str,
        name: &str,
        number: &str,
    ) -> SessionResult<MessageId> {
        self.compose_and_send(key, to, ChatPresenceMedia::Text, |_| async move {
            Ok(Message::Contact(ContactMessage {
                display_name: name.to_string(),
                vcard: contact_card(name, number),
            }))
        })
        .await
    }

    /// Send a link with an action button
    pub async fn send_link(
        &self,
        key: &str,
        to: &str,
        caption: Option<&str>,
        url: &str,
    ) -> SessionResult<MessageId> {
        self.compose_and_send(key, to, ChatPresenceMedia::Text, |_| async move {
            Ok(Message::Link(link_message(caption, url)))
        })
        .await
    }

    /// Send any decodable image as a 512x512 WebP sticker
    pub async fn send_sticker(
        &self,
        key: &str,
        to: &str,
        bytes: Vec<u8>,
    ) -> SessionResult<MessageId> {
        self.compose_and_send(key, to, ChatPresenceMedia::Text, |client| async move {
            let sticker = blocking(move || prepare_sticker(&bytes)).await??;
            let media = upload(client.as_ref(), &sticker.bytes, MediaCategory::Image).await?;
            Ok(Message::Sticker(StickerMessage {
                media,
                mimetype: sticker.mime,
            }))
        })
        .await
    }
}
