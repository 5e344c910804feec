//! Session management
//!
//! Sessions bind two matched connections together until either side leaves.

pub mod table;

pub use table::{Session, SessionTable};
