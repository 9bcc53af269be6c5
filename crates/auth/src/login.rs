use std::sync::Arc;

use crate::error::AuthResult;
use crate::issuer::{IssuedToken, TokenIssuer};
use crate::store::{IdentityStore, SignInResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Authenticated(IssuedToken),
    /// Wrong credentials, unknown user, locked or disabled account. Callers
    /// must not tell these apart in their response.
    Rejected,
}

/// Exchanges a username and password for a bearer token.
#[derive(Clone)]
pub struct LoginService {
    store: Arc<dyn IdentityStore>,
    issuer: Arc<TokenIssuer>,
}

impl LoginService {
    pub fn new(store: Arc<dyn IdentityStore>, issuer: Arc<TokenIssuer>) -> Self {
        Self { store, issuer }
    }

    pub async fn login(&self, username: &str, password: &str) -> AuthResult<LoginOutcome> {
        tracing::info!(username, "login attempt");

        let result = self.store.check_password_sign_in(username, password).await?;
        if result != SignInResult::Succeeded {
            tracing::warn!(username, ?result, "not authenticated");
            return Ok(LoginOutcome::Rejected);
        }

        let Some(identity) = self.store.find_by_name(username).await? else {
            // Account removed between the password check and the lookup.
            tracing::warn!(username, "identity vanished after sign-in");
            return Ok(LoginOutcome::Rejected);
        };

        let issued = self.issuer.issue(&identity)?;
        tracing::info!(username, jti = %issued.jti, "successfully authenticated");
        Ok(LoginOutcome::Authenticated(issued))
    }
}
