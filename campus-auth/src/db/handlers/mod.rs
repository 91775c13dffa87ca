//! Accessors and the factory that hands them out.
//!
//! Callers never share an accessor. Each request asks an [`AccessorFactory`] for a new one,
//! runs its operations, then commits or rolls back:
//!
//! ```ignore
//! use campus_auth::db::handlers::{AccessorFactory, MySqlAccessorFactory};
//!
//! async fn rename(factory: &MySqlAccessorFactory, uuid: &ParentUuid) -> campus_auth::db::errors::Result<()> {
//!     let mut accessor = factory.begin_tx().await?;
//!     let revision = ParentInformRevision {
//!         name: Some(Name::from("박진홍")),
//!         ..Default::default()
//!     };
//!     accessor.modify_parent_inform(uuid, &revision).await?;
//!     accessor.commit().await
//! }
//! ```

pub mod accessor;
pub mod factory;

pub use accessor::Accessor;
pub use factory::{AccessorFactory, MySqlAccessorFactory};
