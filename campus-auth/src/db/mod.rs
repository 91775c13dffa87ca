//! Transaction-scoped account storage.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ AccessorFactory  │  (db::handlers - one accessor per request)
//! └────────┬─────────┘
//!          │ begin_tx
//!          ↓
//! ┌──────────────────┐
//! │     Accessor     │  (db::handlers - validation, composite keys, revisions)
//! └────────┬─────────┘
//!          │ Columns
//!          ↓
//! ┌──────────────────┐
//! │     TxHandle     │  (db::backends - MySQL or in-memory)
//! └────────┬─────────┘
//!          │ EngineError
//!          ↓
//! ┌──────────────────┐
//! │     classify     │  (db::classify - typed DbError)
//! └──────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`fields`]: typed attribute wrappers and their column mapping
//! - [`models`]: entities and sparse revisions
//! - [`schema`]: table descriptors mirroring `migrations/`
//! - [`backends`]: transaction handles
//! - [`handlers`]: the accessor and its factory
//! - [`classify`]: engine error text to typed errors, and back
//! - [`errors`]: the error taxonomy

pub mod backends;
pub mod classify;
pub mod errors;
pub mod fields;
pub mod handlers;
pub mod models;
pub mod schema;
