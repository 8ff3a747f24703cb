pub use super::accounts::Entity as Accounts;
pub use super::email_tokens::Entity as EmailTokens;
pub use super::file_shares::Entity as FileShares;
pub use super::files::Entity as Files;
pub use super::sessions::Entity as Sessions;
pub use super::users::Entity as Users;
