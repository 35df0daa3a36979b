//! Types carried in the cookie session.

pub mod session;

pub use session::{CurrentUser, keys as session_keys};
