// src/io/mod.rs

pub mod dataloader;
pub mod demand;
pub mod reporting;
