pub mod config;
pub mod error;
pub mod io;
pub mod metadata;
pub mod state;
