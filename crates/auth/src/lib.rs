//! Authentication for the bookstore service.
//!
//! Credentials are checked by an [`IdentityStore`]; a successful check is
//! turned into a signed, short-lived bearer token by [`TokenIssuer`], and
//! [`TokenVerifier`] validates such tokens on the way back in.

pub mod claims;
pub mod error;
pub mod issuer;
pub mod login;
pub mod password;
pub mod store;
pub mod verifier;

pub use claims::{Claims, Identity};
pub use error::{AuthError, AuthResult};
pub use issuer::{Clock, IssuedToken, SystemClock, TokenIssuer};
pub use login::{LoginOutcome, LoginService};
pub use store::{IdentityStore, NewIdentity, SignInResult, SqlIdentityStore, IDENTITY_MIGRATION};
pub use verifier::TokenVerifier;

/// Role granted to seeded administrators.
pub const ROLE_ADMINISTRATOR: &str = "Administrator";
/// Default role for ordinary accounts.
pub const ROLE_CUSTOMER: &str = "Customer";
