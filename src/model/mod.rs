pub mod applier_approver;
pub mod capability;
pub mod leave;
pub mod page;
pub mod role;
pub mod user;
