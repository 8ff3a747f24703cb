//! Framework-free view models: state machines that call the file actions and
//! expose their state as plain data.

pub mod actions_menu;
pub mod routes;
pub mod search;
