//! Current user and organization selection
//!
//! The selection has exactly one writer, [`SessionWriter`], owned by the
//! organization context. Everything else reads it through a [`SessionView`].

use callscope_core::{OrganizationId, UserId};
use tokio::sync::watch;

/// Who is signed in and which organization they are working in
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// Signed-in user
    pub user_id: Option<UserId>,

    /// Current organization
    pub organization_id: Option<OrganizationId>,
}

/// Create a session channel seeded with `initial`
#[must_use]
pub fn channel(initial: Session) -> (SessionWriter, SessionView) {
    let (tx, rx) = watch::channel(initial);
    (SessionWriter { tx }, SessionView { rx })
}

/// The single writable handle on the session
#[derive(Debug)]
pub struct SessionWriter {
    tx: watch::Sender<Session>,
}

impl SessionWriter {
    /// Snapshot of the current session
    #[must_use]
    pub fn current(&self) -> Session {
        self.tx.borrow().clone()
    }

    /// Replace the current organization
    pub fn set_organization(&self, organization_id: Option<OrganizationId>) {
        self.tx.send_if_modified(|session| {
            if session.organization_id == organization_id {
                return false;
            }
            session.organization_id = organization_id;
            true
        });
    }

    /// Replace the signed-in user
    pub fn set_user(&self, user_id: Option<UserId>) {
        self.tx.send_if_modified(|session| {
            if session.user_id == user_id {
                return false;
            }
            session.user_id = user_id;
            true
        });
    }

    /// A new read-only view
    #[must_use]
    pub fn view(&self) -> SessionView {
        SessionView {
            rx: self.tx.subscribe(),
        }
    }
}

/// Read-only handle on the session
#[derive(Debug, Clone)]
pub struct SessionView {
    rx: watch::Receiver<Session>,
}

impl SessionView {
    /// Snapshot of the current session
    #[must_use]
    pub fn current(&self) -> Session {
        self.rx.borrow().clone()
    }

    /// Signed-in user, if any
    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        self.rx.borrow().user_id.clone()
    }

    /// Current organization, if any
    #[must_use]
    pub fn organization_id(&self) -> Option<OrganizationId> {
        self.rx.borrow().organization_id.clone()
    }

    /// Wait for the next change and return the new session
    ///
    /// Returns `None` once the writer is gone.
    pub async fn changed(&mut self) -> Option<Session> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_views_observe_writes_synchronously() {
        let (writer, view) = channel(Session::default());
        let second = writer.view();

        writer.set_user(Some("u1".to_string()));
        writer.set_organization(Some("org-42".to_string()));

        assert_eq!(view.organization_id().as_deref(), Some("org-42"));
        assert_eq!(second.user_id().as_deref(), Some("u1"));
        assert_eq!(writer.current(), view.current());
    }

    #[tokio::test]
    async fn test_changed_fires_only_on_real_change() {
        let (writer, mut view) = channel(Session {
            user_id: None,
            organization_id: Some("a".to_string()),
        });

        writer.set_organization(Some("a".to_string()));
        writer.set_organization(Some("b".to_string()));

        let session = view.changed().await.unwrap();
        assert_eq!(session.organization_id.as_deref(), Some("b"));

        drop(writer);
        assert!(view.changed().await.is_none());
    }
}
