pub mod prelude;

pub mod accounts;
pub mod email_tokens;
pub mod file_shares;
pub mod files;
pub mod sessions;
pub mod users;
