use serde::{Deserialize, Serialize};

/// An authenticated principal as seen by the token issuer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub roles: Vec<String>,
}

impl Identity {
    /// Token subject: the email address, falling back to the username for
    /// accounts registered without one.
    pub fn subject(&self) -> &str {
        self.email
            .as_deref()
            .filter(|email| !email.is_empty())
            .unwrap_or(&self.username)
    }
}

/// Registered and private claims carried by every issued token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    /// Unique per token.
    pub jti: String,
    /// Subject identifier of the identity record.
    pub nameid: String,
    /// One entry per role; empty for accounts without roles.
    #[serde(rename = "role", default)]
    pub roles: Vec<String>,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}
