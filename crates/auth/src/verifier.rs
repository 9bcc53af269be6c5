use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use bookstore_kernel::settings::AuthSettings;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};

use crate::claims::Claims;
use crate::error::{AuthError, AuthResult};
use crate::issuer::validate_key;

/// Validates bearer tokens minted by [`crate::TokenIssuer`]: signature,
/// issuer, audience and expiry, with no clock leeway.
pub struct TokenVerifier {
    decoding_key: Arc<DecodingKey>,
    validation: Arc<Validation>,
}

impl Clone for TokenVerifier {
    fn clone(&self) -> Self {
        Self {
            decoding_key: Arc::clone(&self.decoding_key),
            validation: Arc::clone(&self.validation),
        }
    }
}

impl Debug for TokenVerifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenVerifier").finish()
    }
}

impl TokenVerifier {
    pub fn new(signing_key: &[u8], issuer: &str) -> AuthResult<Self> {
        validate_key(signing_key)?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_issuer(&[issuer]);
        validation.set_audience(&[issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

        Ok(Self {
            decoding_key: Arc::new(DecodingKey::from_secret(signing_key)),
            validation: Arc::new(validation),
        })
    }

    pub fn from_settings(settings: &AuthSettings) -> AuthResult<Self> {
        Self::new(settings.signing_key.as_bytes(), &settings.issuer)
    }

    pub fn verify(&self, token: &str) -> AuthResult<Claims> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(AuthError::InvalidToken)
    }
}
