// src/model/mod.rs

pub mod param;
pub mod pipeline;
pub mod spaces;
