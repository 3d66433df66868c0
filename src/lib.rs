pub mod config;
pub mod errors;
pub mod generation;
pub mod jobs;
pub mod observability;
