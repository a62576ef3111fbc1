// Database layer module: connection establishment, schema, data access

pub mod pool;
pub mod repositories;
pub mod schema;

pub use pool::DbPool;
pub use repositories::{MemoryStore, PgStore, Store, TodoStore, UserStore};
pub use schema::{SchemaInitializer, SchemaVariant};
