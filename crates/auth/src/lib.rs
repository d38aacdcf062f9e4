//! `stockledger-auth`: the authentication gate.
//!
//! Password credentials and bearer-token issue/validation. This crate is
//! decoupled from HTTP and storage; callers look users up and hand the
//! records in.

pub mod claims;
pub mod credentials;
pub mod token;

pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use credentials::{CredentialError, PasswordHash, UserAccount};
pub use token::{Hs256TokenService, TokenError, TokenIssuer, TokenValidator};
