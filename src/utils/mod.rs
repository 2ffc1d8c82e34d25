pub mod datetime;
pub mod filesystem;
