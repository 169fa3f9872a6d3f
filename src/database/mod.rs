pub mod connection;
pub mod manager;
pub mod migrations;
pub mod transaction;

pub use connection::*;
pub use manager::*;
pub use migrations::*;
pub use transaction::*;
