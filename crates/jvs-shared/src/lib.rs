pub mod adapters;
pub mod crypto;
pub mod env;
pub mod error;
pub mod logging;
pub mod port;
pub mod subsystem;
