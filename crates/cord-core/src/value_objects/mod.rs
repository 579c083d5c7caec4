//! Value objects - immutable types with validation

mod permissions;

pub use permissions::Permissions;
