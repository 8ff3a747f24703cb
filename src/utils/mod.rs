pub mod file_type;
pub mod hash;
pub mod validation;
