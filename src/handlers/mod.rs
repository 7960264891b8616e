// src/handlers/mod.rs

pub mod progress;
pub mod questions;
pub mod results;
pub mod sessions;
