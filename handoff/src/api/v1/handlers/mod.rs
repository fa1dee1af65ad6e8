pub mod admin;
pub(crate) mod health;
pub mod help_requests;
pub mod knowledge;
mod watch;

pub use health::health_check;
