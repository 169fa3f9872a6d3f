pub mod claims;
pub mod jwt;
pub mod middleware;
pub mod password;

pub use claims::*;
pub use jwt::*;
pub use middleware::*;
pub use password::{hash_password, verify_password};
