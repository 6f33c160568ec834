//! Ephemeral credentials.
//!
//! A [`CredentialLedger`] hands out short-lived secrets for bootstrapping
//! accounts. Timed credentials expire on their own; single-use credentials
//! live until somebody invalidates them. Either way the issuer can await
//! invalidation before issuing the next one.

mod ledger;
pub mod secret;

pub use ledger::{Credential, CredentialKind, CredentialLedger};
