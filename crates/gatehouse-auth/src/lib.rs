pub mod error;
pub mod external;
pub mod otp;
pub mod password;
pub mod reconcile;
pub mod session;
pub mod token;

pub use error::AuthError;
