//! Data models shared by the storage, database and API layers.

mod entity;
mod file;
mod statistic;
mod tenant;

pub use entity::*;
pub use file::*;
pub use statistic::*;
pub use tenant::*;
