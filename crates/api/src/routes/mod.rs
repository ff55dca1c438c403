//! HTTP route handlers

pub mod sessions;
