pub mod name;
pub mod registry;
pub mod session;
