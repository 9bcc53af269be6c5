pub mod authors;
pub mod books;
pub mod records;
pub mod users;

use anyhow::Context;
use bookstore_auth::TokenVerifier;
use bookstore_kernel::{ModuleRegistry, Settings};

/// Register every bookstore module with the registry
pub fn register_all(registry: &mut ModuleRegistry) {
    registry.register_core(users::create_module());
    registry.register_custom(authors::create_module());
    registry.register_custom(books::create_module());
}

/// State a module hands to its router once `init` has run.
#[derive(Clone)]
pub(crate) struct Mounted<S> {
    pub state: S,
    pub verifier: Option<TokenVerifier>,
}

/// Verifier guarding write routes, or `None` when writes are open.
pub(crate) fn write_verifier(settings: &Settings) -> anyhow::Result<Option<TokenVerifier>> {
    if !settings.auth.require_token_for_writes {
        return Ok(None);
    }
    let verifier = TokenVerifier::from_settings(&settings.auth)
        .context("guarding writes requires a usable signing key")?;
    Ok(Some(verifier))
}
