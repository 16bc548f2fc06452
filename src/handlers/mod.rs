// src/handlers/mod.rs

pub mod auth;
pub mod dashboard;
pub mod post;
pub mod profile;
pub mod tickets;
