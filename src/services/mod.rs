pub mod file_service;
pub mod mailer;
pub mod query;
pub mod revalidation;
pub mod session;
pub mod usage;
