//! Shared bearer credential with an epoch counter.
//!
//! Every sign-in or sign-out bumps the epoch. Async work captures the epoch
//! when it issues a request and checks it again before applying the result,
//! so responses that land after a sign-out are dropped.

use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
struct AuthState {
    token: Option<String>,
    epoch: u64,
}

#[derive(Debug, Clone, Default)]
pub struct AuthSession {
    inner: Arc<RwLock<AuthState>>,
}

/// Token plus the epoch it was read in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub epoch: u64,
}

impl AuthSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(token: impl Into<String>) -> Self {
        let session = Self::new();
        session.sign_in(token);
        session
    }

    pub fn sign_in(&self, token: impl Into<String>) {
        let token = token.into();
        let mut state = self.inner.write().unwrap_or_else(|p| p.into_inner());
        state.token = Some(token).filter(|t| !t.trim().is_empty());
        state.epoch += 1;
    }

    pub fn sign_out(&self) {
        let mut state = self.inner.write().unwrap_or_else(|p| p.into_inner());
        state.token = None;
        state.epoch += 1;
    }

    pub fn credential(&self) -> Option<Credential> {
        let state = self.inner.read().unwrap_or_else(|p| p.into_inner());
        state.token.as_ref().map(|token| Credential {
            token: token.clone(),
            epoch: state.epoch,
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .token
            .is_some()
    }

    pub fn epoch(&self) -> u64 {
        self.inner.read().unwrap_or_else(|p| p.into_inner()).epoch
    }

    /// True while the session that issued `epoch` is still signed in.
    pub fn is_current(&self, epoch: u64) -> bool {
        let state = self.inner.read().unwrap_or_else(|p| p.into_inner());
        state.token.is_some() && state.epoch == epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_out_invalidates_captured_epoch() {
        let auth = AuthSession::signed_in("token-1");
        let cred = auth.credential().expect("signed in");
        assert!(auth.is_current(cred.epoch));

        auth.sign_out();
        assert!(!auth.is_current(cred.epoch));
        assert!(auth.credential().is_none());
    }

    #[test]
    fn re_sign_in_does_not_revive_old_epoch() {
        let auth = AuthSession::signed_in("token-1");
        let old = auth.epoch();
        auth.sign_out();
        auth.sign_in("token-2");
        assert!(!auth.is_current(old));
        assert!(auth.is_current(auth.epoch()));
    }

    #[test]
    fn blank_token_is_not_a_credential() {
        let auth = AuthSession::signed_in("   ");
        assert!(!auth.is_authenticated());
    }

    #[test]
    fn clones_share_state() {
        let auth = AuthSession::new();
        let other = auth.clone();
        other.sign_in("abc");
        assert_eq!(auth.credential().map(|c| c.token), Some("abc".to_string()));
    }
}
