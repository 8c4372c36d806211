pub mod cache;
pub mod command;
pub mod fields;
pub mod human;
