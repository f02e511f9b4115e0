//! In-memory stand-ins for the stores and object storage
//!
//! Tests exercise the services without Postgres or a bucket.

mod mock_stores;

pub use mock_stores::{
    sample_file, MockEntityStore, MockFileStore, MockStatisticsStore, MockStorage,
};
