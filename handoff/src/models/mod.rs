mod common;
mod help_request;
mod knowledge;

pub use common::*;
pub use help_request::*;
pub use knowledge::*;
