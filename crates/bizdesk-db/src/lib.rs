//! Bizdesk persistence layer
//!
//! Postgres repositories behind the store traits the services depend on.

pub mod db;
pub mod store_traits;

pub use db::{
    with_transaction, EntityRepository, FileRepository, StatisticsRepository, TenantRepository,
    TransactionGuard,
};
pub use store_traits::{EntityStore, FileStore, StatisticsStore, TenantStore};
