pub mod config;
pub mod management;
pub mod scheduler;
pub mod seed;
pub mod state;
