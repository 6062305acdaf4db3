pub mod config;
pub mod consumers;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod repository;
pub mod services;
