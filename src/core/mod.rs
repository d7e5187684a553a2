pub mod acquire;
pub mod archive;
pub mod config;
pub mod download;
pub mod manifest;
pub mod platform;
pub mod runner;
pub mod strip;
pub mod wrapper;
