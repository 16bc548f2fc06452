// src/services/mod.rs

pub mod auth;
pub mod uploads;
pub mod workflow;
