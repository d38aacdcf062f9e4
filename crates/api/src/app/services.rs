//! Service wiring: storage backend, stock service and token service.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{info, warn};

use stockledger_auth::{
    CredentialError, Hs256TokenService, JwtClaims, TokenIssuer, TokenValidator, UserAccount,
};
use stockledger_infra::{
    InMemoryInventoryStore, InventoryStore, SqliteInventoryStore, StockService, StoreError,
    UserStore,
};

pub type DynStockService = StockService<Arc<dyn InventoryStore>>;

/// Everything the HTTP handlers need, shared behind an `Arc`.
pub struct AppServices {
    pub stock: DynStockService,
    pub users: Arc<dyn UserStore>,
    pub tokens: Arc<Hs256TokenService>,
}

/// Outcome of a successful login.
#[derive(Debug, Clone)]
pub struct LoginGrant {
    pub token: String,
    pub username: String,
    pub expires_in_seconds: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("token issue failed: {0}")]
    Token(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AppServices {
    /// Services backed by the in-memory store (tests/dev).
    pub fn in_memory(jwt_secret: &str, token_ttl: Duration) -> Self {
        let store = Arc::new(InMemoryInventoryStore::new());
        Self::from_parts(store.clone(), store, jwt_secret, token_ttl)
    }

    /// Services backed by SQLite at `database_url`; the schema is created if missing.
    pub async fn sqlite(
        database_url: &str,
        jwt_secret: &str,
        token_ttl: Duration,
    ) -> Result<Self, StoreError> {
        let store = Arc::new(SqliteInventoryStore::connect(database_url).await?);
        store.migrate().await?;
        Ok(Self::from_parts(store.clone(), store, jwt_secret, token_ttl))
    }

    pub fn from_parts(
        inventory: Arc<dyn InventoryStore>,
        users: Arc<dyn UserStore>,
        jwt_secret: &str,
        token_ttl: Duration,
    ) -> Self {
        Self {
            stock: StockService::new(inventory),
            users,
            tokens: Arc::new(Hs256TokenService::new(jwt_secret.as_bytes(), token_ttl)),
        }
    }

    /// Create the operator account unless one with that name already exists.
    pub async fn seed_admin(&self, username: &str, password: &str) -> Result<bool, SeedError> {
        if self.users.find_user(username).await?.is_some() {
            return Ok(false);
        }
        let account = UserAccount::new(username, password)?;
        let inserted = self.users.insert_user_if_absent(&account).await?;
        if inserted {
            info!(username, "seeded default operator account");
        }
        Ok(inserted)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<LoginGrant, LoginError> {
        let Some(user) = self.users.find_user(username).await? else {
            warn!(username, "login failed: unknown user");
            return Err(LoginError::InvalidCredentials);
        };
        if !user.verify_password(password) {
            warn!(username, "login failed: wrong password");
            return Err(LoginError::InvalidCredentials);
        }

        let token = self
            .tokens
            .issue(&user, Utc::now())
            .map_err(|e| LoginError::Token(e.to_string()))?;
        info!(username, "operator logged in");

        Ok(LoginGrant {
            token,
            username: user.username,
            expires_in_seconds: self.tokens.ttl().num_seconds(),
        })
    }

    /// Claims for a presented token, or `None` if it does not validate.
    pub fn session(&self, token: &str) -> Option<JwtClaims> {
        self.tokens.validate(token, Utc::now()).ok()
    }
}
