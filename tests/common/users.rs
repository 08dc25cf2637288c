use fake::Dummy;
use fake::faker::name::en::{FirstName, LastName};
use mongodb::bson::oid::ObjectId;
use mongodb::sync::{Collection, Database};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const USERS_COLLECTION: &str = "users";

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("user.firstName is required")]
    FirstNameRequired,
    #[error("user.lastName is required")]
    LastNameRequired,
    #[error("Inserted id is not an ObjectId")]
    UnexpectedId,
    #[error(transparent)]
    Mongo(#[from] mongodb::error::Error),
}

#[derive(Serialize, Deserialize, Dummy, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[dummy(faker = "FirstName()")]
    pub first_name: String,
    #[dummy(faker = "LastName()")]
    pub last_name: String,
}

pub struct UserRepository {
    users: Collection<User>,
}

impl UserRepository {
    pub fn new(database: &Database) -> Self {
        return Self {
            users: database.collection(USERS_COLLECTION),
        };
    }

    pub fn create_user(&self, user: &User) -> Result<ObjectId, RepositoryError> {
        if user.first_name.is_empty() {
            return Err(RepositoryError::FirstNameRequired);
        }
        if user.last_name.is_empty() {
            return Err(RepositoryError::LastNameRequired);
        }
        let result = self.users.insert_one(user).run()?;
        return result
            .inserted_id
            .as_object_id()
            .ok_or(RepositoryError::UnexpectedId);
    }
}
