use stockledger_auth::JwtClaims;
use stockledger_core::UserId;

/// Authenticated operator for a request.
///
/// Inserted by the auth middleware; present on every protected route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    user_id: UserId,
    username: String,
}

impl UserContext {
    pub fn new(user_id: UserId, username: impl Into<String>) -> Self {
        Self {
            user_id,
            username: username.into(),
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

impl From<JwtClaims> for UserContext {
    fn from(claims: JwtClaims) -> Self {
        Self::new(claims.sub, claims.username)
    }
}
