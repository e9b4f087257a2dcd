pub mod connection;
pub mod store;

pub use connection::{create_pool, verify_connection};
pub use store::{PgStore, Store};
