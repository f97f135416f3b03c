mod access;
mod core;
mod fetch;
mod tx;

pub(crate) use self::core::is_memory_path;
pub use self::core::Connection;
pub use tx::TransactionKind;
