pub mod bridge;
pub mod config;
pub mod controller;
pub mod domain;
pub mod engine;
pub mod error;
pub mod gate;
pub mod logger;
pub mod platform;
pub mod risk;
pub mod state;
pub mod strategy;
pub mod time;
