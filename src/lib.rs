pub mod commands;
pub mod config;
pub mod errors;
pub mod render;
pub mod security;
pub mod uploader;
