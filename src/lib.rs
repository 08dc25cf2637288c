//! Disposable mongo containers for integration tests.
//!
//! ```no_run
//! use mongo_testdb::{ContainerConfig, MongoContainer};
//! use mongo_testdb::mongodb::bson::{Document, doc};
//!
//! let container = MongoContainer::create(ContainerConfig::default()).unwrap();
//! container.must_run_scoped("insert", |db| {
//!     db.collection::<Document>("users")
//!         .insert_one(doc! { "name": "test" })
//!         .run()
//!         .unwrap();
//! });
//! container.stop().unwrap();
//! ```

pub mod config;
pub mod container;
pub mod error;
pub mod global;
pub mod logging;
pub mod session;

pub use config::{ContainerConfig, ResolvedConfig};
pub use container::{ContainerState, MongoContainer};
pub use error::{Error, Result};
pub use session::{
    DatabaseProvider, gen_database_name, must_run_scoped, run_scoped, run_with_database,
    try_run_scoped,
};

pub use mongodb;
