//! SQLite database management

mod configs;
mod connection;
mod logs;
mod settings;
mod strategies;
mod trades;
mod wallets;

pub use configs::*;
pub use connection::Database;
pub use logs::*;
pub use settings::*;
pub use strategies::*;
pub use trades::*;
pub use wallets::*;
