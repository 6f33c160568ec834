//! Authorization, session checks and credential redemption.

use std::sync::Arc;

use tracing::{info, warn};

use checkmate_core::{Credential, CredentialLedger};

use crate::accounts::AccountStore;
use crate::config::ServerConfig;
use crate::continuity::LibraryContinuity;
use crate::error::Result;
use crate::model::{AuthorizationResponse, Feed, NewAccount, PendingAccount, User};

/// Authentication service.
pub struct AuthenticationService {
    accounts: Arc<dyn AccountStore>,
    credentials: Arc<CredentialLedger<PendingAccount>>,
    continuity: Arc<LibraryContinuity>,
    bootstrap: Option<Arc<Credential<PendingAccount>>>,
}

impl AuthenticationService {
    /// Create the service.
    ///
    /// When bootstrap is enabled and the account store is empty, a
    /// single-use credential for an administrator account is issued and
    /// logged so the first user can sign in.
    pub async fn new(
        accounts: Arc<dyn AccountStore>,
        credentials: Arc<CredentialLedger<PendingAccount>>,
        continuity: Arc<LibraryContinuity>,
        config: &ServerConfig,
    ) -> Result<Self> {
        let bootstrap = if config.bootstrap && !accounts.has_users().await? {
            let credential = match &config.bootstrap_secret {
                Some(secret) => credentials.register_single_use(secret.clone()),
                None => credentials.issue_single_use_default(),
            };
            credential.set_tag(PendingAccount::admin());
            warn!(
                secret = credential.secret(),
                "no user present in the account store, bootstrap credential issued"
            );
            Some(credential)
        } else {
            None
        };

        Ok(Self {
            accounts,
            credentials,
            continuity,
            bootstrap,
        })
    }

    /// The bootstrap credential, if one was issued.
    pub fn bootstrap_credential(&self) -> Option<&Arc<Credential<PendingAccount>>> {
        self.bootstrap.as_ref()
    }

    /// Sign a device in and open a session.
    ///
    /// A known password/device pair opens a session directly. Otherwise the
    /// password is tried as an ephemeral credential; redeeming one creates
    /// the pending account it carries.
    pub async fn authorize(
        &self,
        password: &str,
        device_name: &str,
        os: &str,
    ) -> Result<AuthorizationResponse> {
        let user = match self.accounts.user_by_password(password, device_name).await? {
            Some(user) => user,
            None => match self.redeem(password, device_name).await? {
                Some(user) => user,
                None => return Ok(AuthorizationResponse::Denied),
            },
        };

        let token = self.accounts.begin_session(os, user.id).await?;
        info!(user = user.id, device = device_name, os, "session authorized");
        Ok(AuthorizationResponse::Allowed { token })
    }

    async fn redeem(&self, secret: &str, device_name: &str) -> Result<Option<User>> {
        let Some(credential) = self.credentials.find_valid(secret) else {
            return Ok(None);
        };
        // Taking the tag claims the credential against concurrent redeemers.
        let Some(pending) = credential.take_tag() else {
            return Ok(None);
        };

        let created = self
            .accounts
            .add_user(NewAccount {
                password: secret.to_string(),
                device_name: device_name.to_string(),
                role: pending.role,
                reader_id: pending.reader_id.clone(),
            })
            .await;
        let user = match created {
            Ok(user) => user,
            Err(error) => {
                // Hand the claim back so the credential can still be redeemed.
                warn!(
                    credential = credential.id(),
                    error = %error,
                    "account creation failed, credential left open"
                );
                credential.set_tag(pending);
                return Err(error);
            }
        };
        credential.invalidate();

        info!(user = user.id, role = ?user.role, "account created from credential");
        self.continuity.users.broadcast(Feed::entry(user.clone())).await;
        Ok(Some(user))
    }

    /// Check whether a session token is live.
    pub async fn authenticate(&self, token: &str) -> Result<bool> {
        Ok(self.accounts.user_by_token(token).await?.is_some())
    }

    /// Close a session, returning the device it belonged to.
    pub async fn revoke(&self, token: &str) -> Result<Option<String>> {
        Ok(self
            .accounts
            .revoke_session(token)
            .await?
            .map(|session| session.device_name))
    }
}
