// src/strategy/mod.rs

pub mod implementations;
pub mod optimization;
pub mod processors;
pub mod traits;
