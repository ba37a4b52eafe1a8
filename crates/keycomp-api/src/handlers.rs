//! Request handlers.

pub mod compose;
pub mod download;
pub mod health;

pub use compose::compose;
pub use download::download;
pub use health::*;
