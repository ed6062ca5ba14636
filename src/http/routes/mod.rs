pub mod files;
pub mod session;
pub mod todos;
