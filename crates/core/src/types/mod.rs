//! Core types for the marketplace.
//!
//! Type-safe wrappers for the domain concepts shared by every crate.

pub mod email;
pub mod id;
pub mod money;
pub mod role;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::{Money, MoneyError};
pub use role::{Role, RoleParseError};
pub use status::*;
