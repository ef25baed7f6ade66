pub mod password;
pub mod service;
pub mod session;

pub use service::{AuthService, LoginOutcome, Role};
