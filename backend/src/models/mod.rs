pub mod claim;
pub mod user;

pub use claim::IdentityClaim;
pub use user::{split_display_name, UserRecord};
