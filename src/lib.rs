pub mod audit;
pub mod batch;
pub mod config;
pub mod error;
pub mod executor;
pub mod output;
pub mod provider;
pub mod resolver;
pub mod resource;
pub mod tags;
