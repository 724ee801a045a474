//! Authentication and Authorization Module
//!
//! Static role and tool permission tables, plus the identity value that the
//! web layer produces for each authenticated request.

pub mod identity;
pub mod permissions;

pub use identity::AuthenticatedUser;
pub use permissions::{Permission, PermissionModel, Role};
