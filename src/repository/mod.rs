// src/repository/mod.rs
//
// SQL access. Every function takes the pool (or a transaction) it runs on;
// nothing here holds a connection between calls.

pub mod tickets;
pub mod users;
