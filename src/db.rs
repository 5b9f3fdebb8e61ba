// todo_service/src/db.rs
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use diesel::connection::SimpleConnection;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use rocket::fairing::AdHoc;

use crate::config::{AdminAccount, AppConfig};
use crate::models::Role;
use crate::services::auth;

// an R2D2 connection pool
pub type DbPool = r2d2::Pool<ConnectionManager<SqliteConnection>>;
pub type DbConn = r2d2::PooledConnection<ConnectionManager<SqliteConnection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

const POOL_SIZE: u32 = 8;

#[derive(Debug)]
struct SqlitePragmas;

impl CustomizeConnection<SqliteConnection, r2d2::Error> for SqlitePragmas {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), r2d2::Error> {
        conn.batch_execute("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
            .map_err(r2d2::Error::QueryError)
    }
}

/// Initialize the database pool.
pub fn init_pool(database_url: &str) -> Result<DbPool> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    r2d2::Pool::builder()
        .max_size(POOL_SIZE)
        .connection_timeout(Duration::from_secs(10))
        .connection_customizer(Box::new(SqlitePragmas))
        .build(manager)
        .with_context(|| format!("failed to create database pool for {database_url}"))
}

pub fn run_migrations(conn: &mut SqliteConnection) -> Result<()> {
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow!("failed to run migrations: {e}"))?;
    for version in applied {
        tracing::info!(%version, "applied migration");
    }
    Ok(())
}

/// Create the configured admin account unless a user of that name exists.
pub fn ensure_admin(conn: &mut SqliteConnection, admin: &AdminAccount, bcrypt_cost: u32) -> Result<()> {
    if auth::find_user_by_username(conn, &admin.username)
        .map_err(|e| anyhow!("{e}"))?
        .is_some()
    {
        return Ok(());
    }
    auth::create_user(conn, &admin.username, &admin.password, Role::Admin, bcrypt_cost)
        .map_err(|e| anyhow!("failed to create admin user: {e}"))?;
    tracing::info!(username = %admin.username, "created admin user");
    Ok(())
}

pub fn prepare(config: &AppConfig) -> Result<DbPool> {
    let pool = init_pool(&config.database_url)?;
    let mut conn = pool.get().context("failed to get DB connection")?;
    run_migrations(&mut conn)?;
    if let Some(admin) = &config.admin {
        ensure_admin(&mut conn, admin, config.bcrypt_cost)?;
    }
    Ok(pool)
}

// Fairing for attaching the pool to Rocket's managed state
pub fn stage() -> AdHoc {
    AdHoc::try_on_ignite("Diesel SQLite Pool", |rocket| async move {
        let prepared = match rocket.state::<AppConfig>() {
            Some(config) => prepare(config),
            None => Err(anyhow!("AppConfig is not managed")),
        };
        match prepared {
            Ok(pool) => Ok(rocket.manage(pool)),
            Err(e) => {
                tracing::error!(error = %format!("{e:#}"), "database setup failed");
                Err(rocket)
            }
        }
    })
}
