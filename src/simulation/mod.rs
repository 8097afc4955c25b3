// src/simulation/mod.rs

pub mod config;
pub mod engine;
pub mod multi_period;
pub mod newsvendor;
pub mod runner;
