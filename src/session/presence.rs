//! Presence signalling
//!
//! Presence updates are advisory: a failure is logged and never changes the
//! outcome of the operation around it. Chat presence ("typing…",
//! "recording…") is held by a [`ComposingGuard`] for the duration of a send
//! and reverted to paused when the guard is released or dropped.

use crate::engine::{ChatPresence, ChatPresenceMedia, EngineClient, EngineResult, Jid, Presence};
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Log an advisory call's failure and carry on
pub fn advisory(result: EngineResult<()>, what: &str) {
    if let Err(err) = result {
        debug!(error = %err, "advisory {} update failed", what);
    }
}

/// Send a global presence update
pub async fn announce<C: EngineClient + ?Sized>(client: &C, presence: Presence) {
    advisory(client.send_presence(presence).await, "presence");
}

/// Set or clear the composing indicator in a chat
pub async fn set_composing<C: EngineClient + ?Sized>(
    client: &C,
    recipient: &Jid,
    is_composing: bool,
    is_audio: bool,
) {
    let state = if is_composing {
        ChatPresence::Composing
    } else {
        ChatPresence::Paused
    };
    let media = if is_audio {
        ChatPresenceMedia::Audio
    } else {
        ChatPresenceMedia::Text
    };
    advisory(
        client.send_chat_presence(recipient, state, media).await,
        "chat presence",
    );
}

/// Composing indicator held for the lifetime of the guard
///
/// Call [`release`](Self::release) on the normal path. If the guard is
/// dropped instead (a panic unwinding through the send, or the caller
/// dropping the future), the paused update is spawned on the current tokio
/// runtime.
pub struct ComposingGuard<C: EngineClient> {
    client: Arc<C>,
    recipient: Jid,
    media: ChatPresenceMedia,
    armed: bool,
}

impl<C: EngineClient> ComposingGuard<C> {
    pub async fn acquire(client: Arc<C>, recipient: Jid, media: ChatPresenceMedia) -> Self {
        set_composing(
            client.as_ref(),
            &recipient,
            true,
            media == ChatPresenceMedia::Audio,
        )
        .await;
        Self {
            client,
            recipient,
            media,
            armed: true,
        }
    }

    pub fn recipient(&self) -> &Jid {
        &self.recipient
    }

    /// Revert to paused and disarm
    pub async fn release(mut self) {
        self.armed = false;
        set_composing(
            self.client.as_ref(),
            &self.recipient,
            false,
            self.media == ChatPresenceMedia::Audio,
        )
        .await;
    }
}

impl<C: EngineClient> Drop for ComposingGuard<C> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!(recipient = %self.recipient, "no runtime to revert chat presence");
            return;
        };

        let client = Arc::clone(&self.client);
        let recipient = self.recipient.clone();
        let is_audio = self.media == ChatPresenceMedia::Audio;
        runtime.spawn(async move {
            set_composing(client.as_ref(), &recipient, false, is_audio).await;
        });
    }
}

/// Run `work` with the composing indicator shown to `recipient`
pub async fn with_composing<C, F, T>(
    client: Arc<C>,
    recipient: Jid,
    media: ChatPresenceMedia,
    work: F,
) -> T
where
    C: EngineClient,
    F: Future<Output = T>,
{
    let guard = ComposingGuard::acquire(client, recipient, media).await;
    let output = work.await;
    guard.release().await;
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Device, MockCall, MockClient};
    use crate::session::tests::client_options;
    use std::time::Duration;

    fn client() -> Arc<MockClient> {
        Arc::new(MockClient::new(Device::new(1), client_options()))
    }

    async fn wait_for_calls(client: &MockClient, n: usize) {
        tokio::time::timeout(Duration::from_secs(1), async {
            while client.chat_presence().len() < n {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("presence revert never arrived");
    }

    #[tokio::test]
    async fn test_set_composing_maps_media() {
        let client = client();
        let jid = Jid::user("628123");

        set_composing(client.as_ref(), &jid, true, true).await;
        set_composing(client.as_ref(), &jid, false, false).await;

        assert_eq!(
            client.chat_presence(),
            vec![
                (jid.clone(), ChatPresence::Composing, ChatPresenceMedia::Audio),
                (jid, ChatPresence::Paused, ChatPresenceMedia::Text),
            ]
        );
    }

    #[tokio::test]
    async fn test_presence_errors_are_swallowed() {
        let client = client();
        client.fail_presence(true);

        let out = with_composing(
            Arc::clone(&client),
            Jid::user("628123"),
            ChatPresenceMedia::Text,
            async { 7 },
        )
        .await;
        announce(client.as_ref(), Presence::Available).await;

        assert_eq!(out, 7);
        assert_eq!(client.chat_presence().len(), 2);
        assert_eq!(client.count(&MockCall::Presence(Presence::Available)), 1);
    }

    #[tokio::test]
    async fn test_with_composing_reverts_after_error() {
        let client = client();
        let jid = Jid::user("628123");

        let result: Result<(), &str> = with_composing(
            Arc::clone(&client),
            jid.clone(),
            ChatPresenceMedia::Text,
            async { Err("upload failed") },
        )
        .await;

        assert!(result.is_err());
        let states: Vec<_> = client.chat_presence().into_iter().map(|c| c.1).collect();
        assert_eq!(states, vec![ChatPresence::Composing, ChatPresence::Paused]);
    }

    #[tokio::test]
    async fn test_guard_reverts_on_panic() {
        let client = client();
        let task_client = Arc::clone(&client);

        let joined = tokio::spawn(async move {
            with_composing(
                task_client,
                Jid::user("628123"),
                ChatPresenceMedia::Audio,
                async { panic!("composer blew up") },
            )
            .await
        })
        .await;

        assert!(joined.unwrap_err().is_panic());
        wait_for_calls(&client, 2).await;
        assert_eq!(
            client.chat_presence()[1],
            (
                Jid::user("628123"),
                ChatPresence::Paused,
                ChatPresenceMedia::Audio
            )
        );
    }

    #[tokio::test]
    async fn test_guard_reverts_on_cancellation() {
        let client = client();
        let task_client = Arc::clone(&client);

        let task = tokio::spawn(async move {
            with_composing(
                task_client,
                Jid::user("628123"),
                ChatPresenceMedia::Text,
                std::future::pending::<()>(),
            )
            .await
        });

        wait_for_calls(&client, 1).await;
        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());

        wait_for_calls(&client, 2).await;
        assert_eq!(client.chat_presence()[1].1, ChatPresence::Paused);
    }
}
