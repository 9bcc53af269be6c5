use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use bookstore_kernel::settings::AuthSettings;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::claims::{Claims, Identity};
use crate::error::{AuthError, AuthResult};

/// Shortest HMAC key accepted for HS256 signatures.
pub const MIN_KEY_BYTES: usize = 32;

/// Longest validity window an access token may be minted with.
pub const MAX_VALIDITY: Duration = Duration::days(1);

/// Source of the current instant, injectable for tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// A signed compact token and the instants it was minted for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub jti: String,
    pub issued_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

impl IssuedToken {
    /// Lifetime in whole seconds.
    pub fn expires_in(&self) -> i64 {
        (self.expires_at - self.issued_at).whole_seconds()
    }
}

/// Mints HS256 bearer tokens. Stateless apart from its configuration.
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    issuer: String,
    validity: Duration,
    clock: Arc<dyn Clock>,
}

impl Debug for TokenIssuer {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("issuer", &self.issuer)
            .field("validity", &self.validity)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub fn new(signing_key: &[u8], issuer: impl Into<String>, validity: Duration) -> AuthResult<Self> {
        let issuer = issuer.into();
        validate_key(signing_key)?;
        if issuer.trim().is_empty() {
            return Err(AuthError::Configuration("issuer must not be empty".into()));
        }
        if validity <= Duration::ZERO {
            return Err(AuthError::Configuration(
                "token validity must be positive".into(),
            ));
        }
        if validity > MAX_VALIDITY {
            return Err(AuthError::Configuration(format!(
                "token validity must not exceed {} minutes",
                MAX_VALIDITY.whole_minutes()
            )));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(signing_key),
            issuer,
            validity,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn from_settings(settings: &AuthSettings) -> AuthResult<Self> {
        let validity = settings
            .token_validity_minutes
            .checked_mul(60)
            .map(Duration::seconds)
            .ok_or_else(|| {
                AuthError::Configuration("token validity is out of range".into())
            })?;
        Self::new(settings.signing_key.as_bytes(), settings.issuer.clone(), validity)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Sign a fresh token for `identity`. The audience equals the issuer.
    pub fn issue(&self, identity: &Identity) -> AuthResult<IssuedToken> {
        // JWT timestamps carry whole seconds only.
        let now = self.clock.now();
        let issued_at = now - Duration::nanoseconds(i64::from(now.nanosecond()));
        let expires_at = issued_at.checked_add(self.validity).ok_or_else(|| {
            AuthError::Configuration("token expiry is out of range".into())
        })?;
        let jti = Uuid::new_v4().to_string();

        let claims = Claims {
            sub: identity.subject().to_string(),
            jti: jti.clone(),
            nameid: identity.id.clone(),
            roles: identity.roles.clone(),
            iss: self.issuer.clone(),
            aud: self.issuer.clone(),
            iat: issued_at.unix_timestamp(),
            exp: expires_at.unix_timestamp(),
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(AuthError::Signing)?;

        Ok(IssuedToken {
            token,
            jti,
            issued_at,
            expires_at,
        })
    }
}

pub(crate) fn validate_key(signing_key: &[u8]) -> AuthResult<()> {
    if signing_key.is_empty() {
        return Err(AuthError::Configuration("signing key is not configured".into()));
    }
    if signing_key.len() < MIN_KEY_BYTES {
        return Err(AuthError::Configuration(format!(
            "signing key must be at least {MIN_KEY_BYTES} bytes"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verifier::TokenVerifier;

    const KEY: &[u8] = b"0123456789abcdef0123456789abcdef";

    struct FixedClock(OffsetDateTime);

    impl Clock for FixedClock {
        fn now(&self) -> OffsetDateTime {
            self.0
        }
    }

    fn admin() -> Identity {
        Identity {
            id: "42".into(),
            username: "admin".into(),
            email: Some("a@b.com".into()),
            roles: vec!["Admin".into()],
        }
    }

    #[test]
    fn issued_claims_describe_the_identity() {
        let now = OffsetDateTime::now_utc().replace_nanosecond(0).unwrap();
        let issuer = TokenIssuer::new(KEY, "bookstore-api", Duration::minutes(5))
            .unwrap()
            .with_clock(Arc::new(FixedClock(now)));

        let issued = issuer.issue(&admin()).unwrap();
        assert_eq!(issued.expires_at, now + Duration::minutes(5));
        assert_eq!(issued.expires_in(), 300);

        let claims = TokenVerifier::new(KEY, "bookstore-api")
            .unwrap()
            .verify(&issued.token)
            .unwrap();
        assert_eq!(claims.sub, "a@b.com");
        assert_eq!(claims.nameid, "42");
        assert_eq!(claims.roles, vec!["Admin".to_string()]);
        assert_eq!(claims.iss, "bookstore-api");
        assert_eq!(claims.aud, "bookstore-api");
        assert_eq!(claims.iat, now.unix_timestamp());
        assert_eq!(claims.exp, now.unix_timestamp() + 300);
        assert_eq!(claims.jti, issued.jti);
    }

    #[test]
    fn same_instant_tokens_differ_only_in_jti() {
        let now = OffsetDateTime::now_utc().replace_nanosecond(0).unwrap();
        let issuer = TokenIssuer::new(KEY, "bookstore-api", Duration::minutes(5))
            .unwrap()
            .with_clock(Arc::new(FixedClock(now)));
        let verifier = TokenVerifier::new(KEY, "bookstore-api").unwrap();

        let first = issuer.issue(&admin()).unwrap();
        let second = issuer.issue(&admin()).unwrap();
        let a = verifier.verify(&first.token).unwrap();
        let b = verifier.verify(&second.token).unwrap();

        assert_ne!(a.jti, b.jti);
        assert_ne!(first.token, second.token);
        assert_eq!(a.sub, b.sub);
        assert_eq!(a.nameid, b.nameid);
        assert_eq!(a.roles, b.roles);
        assert_eq!(a.iat, b.iat);
        assert_eq!(a.exp, b.exp);
        assert_eq!(a.exp, now.unix_timestamp() + 300);
    }

    #[test]
    fn roles_claim_is_an_empty_list_without_roles() {
        let issuer = TokenIssuer::new(KEY, "bookstore-api", Duration::minutes(5)).unwrap();
        let identity = Identity {
            roles: vec![],
            ..admin()
        };
        let issued = issuer.issue(&identity).unwrap();
        let claims = TokenVerifier::new(KEY, "bookstore-api")
            .unwrap()
            .verify(&issued.token)
            .unwrap();
        assert!(claims.roles.is_empty());
    }

    #[test]
    fn subject_falls_back_to_username() {
        let identity = Identity {
            email: None,
            ..admin()
        };
        assert_eq!(identity.subject(), "admin");
    }

    #[test]
    fn missing_or_short_keys_fail_fast() {
        for key in [&b""[..], &b"short"[..]] {
            let err = TokenIssuer::new(key, "bookstore-api", Duration::minutes(5)).unwrap_err();
            assert!(matches!(err, AuthError::Configuration(_)));
        }

        let settings = AuthSettings::default();
        assert!(matches!(
            TokenIssuer::from_settings(&settings),
            Err(AuthError::Configuration(_))
        ));
    }

    #[test]
    fn non_positive_validity_is_rejected() {
        let err = TokenIssuer::new(KEY, "bookstore-api", Duration::ZERO).unwrap_err();
        assert!(matches!(err, AuthError::Configuration(_)));
    }

    #[test]
    fn oversized_validity_is_rejected_at_construction() {
        let err = TokenIssuer::new(KEY, "bookstore-api", Duration::minutes(10_000_000_000))
            .unwrap_err();
        assert!(matches!(err, AuthError::Configuration(_)));

        for minutes in [10_000_000_000, i64::MAX] {
            let settings = AuthSettings {
                signing_key: String::from_utf8(KEY.to_vec()).unwrap(),
                token_validity_minutes: minutes,
                ..AuthSettings::default()
            };
            assert!(matches!(
                TokenIssuer::from_settings(&settings),
                Err(AuthError::Configuration(_))
            ));
        }
    }

    #[test]
    fn expiry_past_the_calendar_end_is_an_error() {
        let issuer = TokenIssuer::new(KEY, "bookstore-api", Duration::minutes(5))
            .unwrap()
            .with_clock(Arc::new(FixedClock(time::PrimitiveDateTime::new(
                time::Date::MAX,
                time::Time::MIDNIGHT,
            )
            .assume_utc())));
        assert!(matches!(
            issuer.issue(&admin()),
            Err(AuthError::Configuration(_))
        ));
    }
}
