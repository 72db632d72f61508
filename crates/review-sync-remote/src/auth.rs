use std::fmt;
use tokio::sync::watch;
use tracing::info;

/// Opaque bearer token proving the user is signed in
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Keep tokens out of logs
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Source of the current credential and of sign-in/sign-out notifications.
///
/// The review repository and synchronizer only read from it.
pub trait AuthSessionProvider: Send + Sync {
    fn credential(&self) -> Option<Credential>;

    /// Every change of the credential, starting from the current one
    fn subscribe(&self) -> watch::Receiver<Option<Credential>>;

    fn is_signed_in(&self) -> bool {
        self.credential().is_some()
    }
}

/// In-process session backed by a watch channel
pub struct AuthSession {
    sender: watch::Sender<Option<Credential>>,
}

impl AuthSession {
    pub fn signed_out() -> Self {
        let (sender, _) = watch::channel(None);
        Self { sender }
    }

    pub fn signed_in(credential: Credential) -> Self {
        let (sender, _) = watch::channel(Some(credential));
        Self { sender }
    }

    pub fn from_token(token: Option<String>) -> Self {
        match token {
            Some(token) if !token.trim().is_empty() => Self::signed_in(Credential::new(token)),
            _ => Self::signed_out(),
        }
    }

    pub fn sign_in(&self, credential: Credential) {
        info!(operation = "sign_in", "Auth session signed in");
        self.sender.send_replace(Some(credential));
    }

    pub fn sign_out(&self) {
        info!(operation = "sign_out", "Auth session signed out");
        self.sender.send_replace(None);
    }
}

impl AuthSessionProvider for AuthSession {
    fn credential(&self) -> Option<Credential> {
        self.sender.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<Credential>> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hides_token() {
        let credential = Credential::new("secret-token");
        assert_eq!(format!("{:?}", credential), "Credential(***)");
        assert_eq!(credential.as_str(), "secret-token");
    }

    #[test]
    fn test_from_token_ignores_blank() {
        assert!(!AuthSession::from_token(None).is_signed_in());
        assert!(!AuthSession::from_token(Some("  ".to_string())).is_signed_in());
        assert!(AuthSession::from_token(Some("abc".to_string())).is_signed_in());
    }

    #[tokio::test]
    async fn test_subscribers_see_sign_in_and_sign_out() {
        let session = AuthSession::signed_out();
        let mut rx = session.subscribe();
        assert!(rx.borrow().is_none());

        session.sign_in(Credential::new("t1"));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().as_ref().map(Credential::as_str), Some("t1"));

        session.sign_out();
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_none());
        assert!(!session.is_signed_in());
    }
}
