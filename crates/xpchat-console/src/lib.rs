//! Console wiring: auth, membership and the realtime feed for one room.

pub mod auth;
pub mod config;
pub mod console;
pub mod terminal;

pub use auth::LocalAuth;
pub use config::ConsoleConfig;
pub use console::{Collaborators, Console};
