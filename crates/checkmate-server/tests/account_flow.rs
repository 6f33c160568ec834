//! Integration tests for account bootstrap and creation through the services.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use checkmate_core::{CredentialLedger, Subscriber};
use checkmate_server::model::{
    AddUserResponse, AuthorizationResponse, Feed, PendingAccount, User, UserRole,
};
use checkmate_server::{
    AccountStore, AuthenticationService, LibraryContinuity, LibraryService, MemoryAccountStore,
    ServerConfig,
};

struct TestContext {
    store: Arc<MemoryAccountStore>,
    ledger: Arc<CredentialLedger<PendingAccount>>,
    continuity: Arc<LibraryContinuity>,
    auth: AuthenticationService,
    library: Arc<LibraryService>,
}

impl TestContext {
    async fn new(config: ServerConfig) -> Self {
        let store = Arc::new(MemoryAccountStore::new());
        let ledger = Arc::new(CredentialLedger::new(config.credentials.clone()));
        let continuity = Arc::new(LibraryContinuity::new(&config.continuity));
        let auth = AuthenticationService::new(
            store.clone(),
            ledger.clone(),
            continuity.clone(),
            &config,
        )
        .await
        .unwrap();
        let library = Arc::new(LibraryService::new(
            store.clone(),
            continuity.clone(),
            ledger.clone(),
            &config,
        ));

        Self {
            store,
            ledger,
            continuity,
            auth,
            library,
        }
    }

    async fn sign_in(&self, password: &str, device: &str) -> String {
        match self.auth.authorize(password, device, "linux").await.unwrap() {
            AuthorizationResponse::Allowed { token } => token,
            AuthorizationResponse::Denied => panic!("{device} should be allowed"),
        }
    }
}

async fn next_entry(rx: &mut mpsc::UnboundedReceiver<Feed<User>>) -> User {
    timeout(Duration::from_secs(1), async {
        loop {
            match rx.recv().await {
                Some(Feed::Entry { value, .. }) => return value,
                Some(_) => continue,
                None => panic!("users feed closed"),
            }
        }
    })
    .await
    .expect("no user entry arrived")
}

#[tokio::test]
async fn bootstrap_then_create_reader_account() {
    let ctx = TestContext::new(ServerConfig::default().with_bootstrap_secret("7f3a9c")).await;

    // First admin redeems the bootstrap credential.
    let admin_token = ctx.sign_in("7f3a9c", "front-desk").await;
    assert_eq!(ctx.ledger.live_count(), 0);

    // Admin watches the users feed.
    let (users_tx, mut users_rx) = mpsc::unbounded_channel();
    let feed = {
        let library = Arc::clone(&ctx.library);
        let token = admin_token.clone();
        tokio::spawn(async move {
            library
                .stream_users(&token, Subscriber::from_writer(users_tx))
                .await
        })
    };
    let admin = next_entry(&mut users_rx).await;
    assert_eq!(admin.role, UserRole::Admin);
    timeout(Duration::from_secs(1), async {
        while ctx.continuity.users.parked_count() == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .unwrap();

    // Admin opens an add-user stream for a reader account.
    let (grant_tx, mut grant_rx) = mpsc::unbounded_channel();
    let issuer = {
        let library = Arc::clone(&ctx.library);
        tokio::spawn(async move {
            let pending = PendingAccount {
                role: UserRole::Reader,
                reader_id: Some("reader-7".to_string()),
            };
            library
                .add_user("7f3a9c", "front-desk", pending, Arc::new(grant_tx))
                .await
        })
    };

    let secret = match grant_rx.recv().await.unwrap() {
        AddUserResponse::Granted { secret, .. } => secret,
        AddUserResponse::Denied => panic!("admin should be granted"),
    };
    assert_eq!(secret.len(), 8);

    // The new device redeems it; the users feed announces the account.
    let reader_token = ctx.sign_in(&secret, "kiosk").await;
    let created = next_entry(&mut users_rx).await;
    assert_eq!(created.role, UserRole::Reader);
    assert_eq!(created.reader_id.as_deref(), Some("reader-7"));
    assert_eq!(
        ctx.store.user_by_token(&reader_token).await.unwrap(),
        Some(created)
    );

    // The issuer moved on to the next credential.
    let next = timeout(Duration::from_secs(1), grant_rx.recv())
        .await
        .unwrap()
        .unwrap();
    let AddUserResponse::Granted { secret: second, .. } = next else {
        panic!("expected another credential");
    };
    assert_ne!(second, secret);
    assert!(ctx.ledger.find_valid(&secret).is_none());
    assert!(ctx.ledger.find_valid(&second).is_some());

    // Tear down: the issuer stops once its stream is gone, the feed unparks.
    drop(grant_rx);
    ctx.ledger.shutdown();
    ctx.continuity.shutdown();

    let issued = timeout(Duration::from_secs(1), issuer)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(issued, 2);
    timeout(Duration::from_secs(1), feed)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn expired_add_user_credential_is_replaced() {
    let config = ServerConfig::default()
        .with_bootstrap_secret("root-secret")
        .with_add_user_lifespan(Duration::from_millis(60));
    let ctx = TestContext::new(config).await;
    ctx.sign_in("root-secret", "desk").await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let issuer = {
        let library = Arc::clone(&ctx.library);
        tokio::spawn(async move {
            library
                .add_user("root-secret", "desk", PendingAccount::admin(), Arc::new(tx))
                .await
        })
    };

    let first = match rx.recv().await.unwrap() {
        AddUserResponse::Granted { secret, .. } => secret,
        AddUserResponse::Denied => panic!("admin should be granted"),
    };
    assert!(ctx.ledger.find_valid(&first).is_some());

    // No redemption: the timer expires it and a new one follows.
    let second = timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(second, AddUserResponse::Granted { .. }));
    assert!(ctx.ledger.find_valid(&first).is_none());

    let denied = ctx.auth.authorize(&first, "other", "linux").await.unwrap();
    assert_eq!(denied, AuthorizationResponse::Denied);

    drop(rx);
    ctx.ledger.shutdown();
    timeout(Duration::from_secs(1), issuer)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}
