//! Per-test databases.
//!
//! Every scoped run gets a database with a random name, so tests sharing one
//! container never see each other's data and can run in parallel.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, error, info_span};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Something that can hand out named databases and drop them again.
pub trait DatabaseProvider {
    type Database;

    fn new_database(&self, name: &str) -> Result<Self::Database>;

    fn drop_database(&self, database: &Self::Database) -> Result<()>;
}

/// 32 lowercase hex chars of a v4 uuid.
pub fn gen_database_name() -> String {
    return Uuid::new_v4().simple().to_string();
}

struct Outcome<R> {
    body: std::thread::Result<R>,
    cleanup: Result<()>,
}

fn scoped<P, R>(
    provider: &P,
    name: &str,
    body: impl FnOnce(&P::Database) -> R,
) -> Result<Outcome<R>>
where
    P: DatabaseProvider + ?Sized,
{
    let database_name = gen_database_name();
    let span = info_span!("scoped", test = name, database = %database_name);
    let _guard = span.enter();

    let database = provider.new_database(&database_name)?;
    debug!("Created database {database_name}");

    let body_result = panic::catch_unwind(AssertUnwindSafe(|| body(&database)));
    let cleanup = provider
        .drop_database(&database)
        .map_err(|err| into_cleanup_error(&database_name, err));

    if cleanup.is_ok() {
        debug!("Dropped database {database_name}");
    }

    return Ok(Outcome {
        body: body_result,
        cleanup,
    });
}

fn into_cleanup_error(database: &str, err: Error) -> Error {
    return match err {
        Error::Cleanup { .. } => err,
        other => Error::Cleanup {
            database: database.to_string(),
            source: other.into(),
        },
    };
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return message.to_string();
    }
    return payload
        .downcast_ref::<String>()
        .cloned()
        .unwrap_or_else(|| "test body panicked".to_string());
}

fn resume_panic(payload: Box<dyn Any + Send>, cleanup: Result<()>) -> ! {
    let Err(err) = cleanup else {
        panic::resume_unwind(payload);
    };
    error!("Test body panicked and the database was not dropped: {err}");
    panic!("{}; additionally {err}", panic_message(payload.as_ref()));
}

/// Runs `body` against a fresh database and drops the database afterwards,
/// also when `body` panics. A panic is resumed after the cleanup.
///
/// If the database can't be created, `body` is never called.
pub fn run_scoped<P, R>(
    provider: &P,
    name: &str,
    body: impl FnOnce(&P::Database) -> R,
) -> Result<R>
where
    P: DatabaseProvider + ?Sized,
{
    let outcome = scoped(provider, name, body)?;
    return match outcome.body {
        Ok(value) => outcome.cleanup.map(|()| value),
        Err(payload) => resume_panic(payload, outcome.cleanup),
    };
}

/// Same as [`run_scoped`] for fallible bodies. When both the body and the
/// cleanup fail, both errors are returned in [`Error::BodyAndCleanup`].
pub fn try_run_scoped<P, R>(
    provider: &P,
    name: &str,
    body: impl FnOnce(&P::Database) -> anyhow::Result<R>,
) -> Result<R>
where
    P: DatabaseProvider + ?Sized,
{
    let outcome = scoped(provider, name, body)?;
    return match (outcome.body, outcome.cleanup) {
        (Ok(Ok(value)), Ok(())) => Ok(value),
        (Ok(Ok(_)), Err(cleanup)) => Err(cleanup),
        (Ok(Err(body)), Ok(())) => Err(Error::Body(body)),
        (Ok(Err(body)), Err(cleanup)) => Err(Error::BodyAndCleanup {
            body,
            cleanup: Box::new(cleanup),
        }),
        (Err(payload), cleanup) => resume_panic(payload, cleanup),
    };
}

/// [`run_scoped`] that panics on provisioning or cleanup errors.
pub fn must_run_scoped<P, R>(
    provider: &P,
    name: &str,
    body: impl FnOnce(&P::Database) -> R,
) -> R
where
    P: DatabaseProvider + ?Sized,
{
    return match run_scoped(provider, name, body) {
        Ok(value) => value,
        Err(err) => panic!("{name}: {err}"),
    };
}

/// Runs `body` against a database the caller created and owns. Nothing is
/// dropped afterwards.
pub fn run_with_database<D, R>(name: &str, database: &D, body: impl FnOnce(&D) -> R) -> R {
    let span = info_span!("scoped", test = name);
    let _guard = span.enter();
    return body(database);
}
