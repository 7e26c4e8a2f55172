// src/lib.rs

pub mod api;
pub mod app_state;
pub mod blob;
pub mod config;
pub mod error;
pub mod metadata;
pub mod record;
pub mod service;
