//! Authentication module

pub mod jwt;
pub mod middleware;
pub mod password;

pub use jwt::{AuthError, Claims, TokenService};
pub use middleware::{extract_token, BearerToken};
pub use password::PasswordHasher;
