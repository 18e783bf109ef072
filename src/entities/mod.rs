pub mod prelude;

pub mod permission;
pub mod role;
pub mod role_permission;
