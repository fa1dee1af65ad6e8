//! v1 API Data Transfer Objects.
//!
//! Wire format of the v1 REST API, kept separate from the domain models in
//! `src/models/`.

pub mod admin;
pub mod help_requests;
pub mod knowledge;

pub use admin::*;
pub use help_requests::*;
pub use knowledge::*;
