// src/models/mod.rs

pub mod attachment;
pub mod response;
pub mod ticket;
pub mod user;
