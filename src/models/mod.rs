// src/models/mod.rs

pub mod assessment;
pub mod progress;
pub mod question;
pub mod result_record;
