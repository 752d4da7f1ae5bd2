//! Joined group listing

use crate::engine::{Engine, EngineClient, GroupInfo};
use crate::error::{SessionError, SessionResult};
use crate::session::SessionManager;
use tracing::debug;

impl<E: Engine> SessionManager<E> {
    /// Groups the tenant's account has joined, in engine order
    pub async fn groups(&self, key: &str) -> SessionResult<Vec<GroupInfo>> {
        let session = self.lock_live(key).await?;
        session.ensure_ready()?;

        let groups = session
            .client()
            .joined_groups()
            .await
            .map_err(SessionError::Engine)?;

        debug!(tenant = %key, count = groups.len(), "listed joined groups");
        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineError, Jid, MockCall};
    use crate::session::tests::{manager, online_session};

    fn group(id: &str, name: &str) -> GroupInfo {
        GroupInfo {
            jid: Jid::group(id),
            name: name.to_string(),
            topic: None,
            participants: vec![Jid::user("628111"), Jid::user("628222")],
            announce_only: false,
            locked: false,
        }
    }

    #[tokio::test]
    async fn test_no_groups_is_empty() {
        let (manager, engine, _store) = manager();
        online_session(&manager, &engine, "tenant-a").await;

        let groups = manager.groups("tenant-a").await.unwrap();

        assert!(groups.is_empty());
    }

    #[tokio::test]
    async fn test_groups_keep_engine_order() {
        let (manager, engine, _store) = manager();
        let client = online_session(&manager, &engine, "tenant-a").await;
        client.add_group(group("120363000000000002", "Zulu"));
        client.add_group(group("120363000000000001", "Alpha"));

        let names: Vec<_> = manager
            .groups("tenant-a")
            .await
            .unwrap()
            .into_iter()
            .map(|g| g.name)
            .collect();

        assert_eq!(names, vec!["Zulu", "Alpha"]);
    }

    #[tokio::test]
    async fn test_groups_require_login() {
        let (manager, engine, _store) = manager();
        let client = online_session(&manager, &engine, "tenant-a").await;
        client.set_logged_in(false);

        let err = manager.groups("tenant-a").await.unwrap_err();

        assert!(matches!(err, SessionError::ClientNotLoggedIn));
        assert_eq!(client.count(&MockCall::JoinedGroups), 0);
    }

    #[tokio::test]
    async fn test_groups_engine_failure() {
        let (manager, engine, _store) = manager();
        let client = online_session(&manager, &engine, "tenant-a").await;
        client.fail_lookup(Some(EngineError::Protocol("iq error".to_string())));

        assert!(matches!(
            manager.groups("tenant-a").await,
            Err(SessionError::Engine(_))
        ));
    }
}
