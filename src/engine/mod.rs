// src/engine/mod.rs

pub mod notifier;
pub mod ordering;
pub mod progress;
pub mod recorder;
pub mod registry;
pub mod runner;
pub mod scoring;
pub mod session;
pub mod validator;
