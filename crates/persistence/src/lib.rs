//! Swapcycle Persistence - Database, key encryption and caching layer

pub mod cache;
pub mod encryption;
pub mod sqlite;
pub mod store;

pub use cache::PriceCache;
pub use encryption::derive_machine_key;
pub use encryption::{EncryptedKey, KeyEncryptor};
pub use sqlite::Database;
pub use store::WalletStore;
