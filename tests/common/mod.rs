#![allow(dead_code)]
pub mod users;

use mongo_testdb::logging::init_tracing;
use mongo_testdb::{ContainerConfig, MongoContainer};
use mongodb::bson::{Document, doc};
use mongodb::sync::Database;
use rstest::fixture;
use tracing::Level;

#[fixture]
pub fn container() -> MongoContainer {
    init_tracing(Level::DEBUG);
    return MongoContainer::create(ContainerConfig::from_env())
        .expect("Unable to start mongo container for tests");
}

/// Mongo only creates a database on the first write.
pub fn touch(database: &Database) {
    database
        .collection::<Document>("touch")
        .insert_one(doc! { "touched": true })
        .run()
        .expect("Unable to write into the test database");
}

pub fn database_exists(container: &MongoContainer, name: &str) -> bool {
    return container
        .database_names()
        .expect("Unable to list databases")
        .iter()
        .any(|existing| existing == name);
}
