pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{DbError, DbResult, UniqueKey};
pub use memory::MemoryStore;
pub use postgres::{Db, connect, migrate};
pub use store::{AccountStore, RefreshRecord};
