// src/lib.rs - Library root for Caigentan

pub mod chat;
pub mod cli;
pub mod infra;
pub mod preferences;
pub mod provider;
pub mod server;
