pub mod config;
pub mod framework;
pub mod supervisor;
