//! Database repositories
//!
//! Every query is scoped by `tenant_id` except the cross-tenant maintenance
//! scans used by the cleanup task.

pub mod entity;
pub mod file;
pub mod statistics;
pub mod tenant;
pub mod transaction;

pub use entity::EntityRepository;
pub use file::FileRepository;
pub use statistics::StatisticsRepository;
pub use tenant::TenantRepository;
pub use transaction::{with_transaction, TransactionGuard};
