//! # campus-auth: account storage for school administration services
//!
//! Credentials and profiles for students, teachers, parents and administrators, stored in
//! MySQL and reached only through transaction-bound accessors.
//!
//! ## Overview
//!
//! - **Per-request transactions**: an [`AccessorFactory`] hands every request its own
//!   [`Accessor`], which exclusively owns one transaction until it is committed or rolled
//!   back.
//! - **Sparse revisions**: updates and criteria reads take revision structs whose fields are
//!   all optional, so only what the caller supplied is written or matched.
//! - **Typed database errors**: duplicate keys and foreign-key violations come back as
//!   comparable values ([`db::classify`]), never as raw engine text.
//!
//! ## Usage
//!
//! ```ignore
//! use campus_auth::{AccessorFactory, MySqlAccessorFactory, config::{Args, Config, DatabaseSecret}};
//!
//! let config = Config::load(&args)?;
//! let secret = DatabaseSecret::load(&args)?;
//! let factory = MySqlAccessorFactory::connect(&config.database, &secret).await?;
//! campus_auth::migrator().run(factory.pool()).await?;
//!
//! let mut accessor = factory.begin_tx().await?;
//! let admin = accessor.get_admin_auth_with_id(&AdminId::from("root")).await?;
//! accessor.commit().await?;
//! ```
//!
//! ## Testing
//!
//! [`db::backends::MemoryStore`] implements [`AccessorFactory`] with the same key and
//! foreign-key behaviour as the MySQL schema, so accessor logic is tested without a server.

pub mod config;
pub mod db;
pub mod errors;
pub mod telemetry;

pub use config::Config;
pub use db::handlers::{Accessor, AccessorFactory, MySqlAccessorFactory};

/// Get the account schema migrator.
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}
