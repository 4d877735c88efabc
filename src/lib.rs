pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod moodle;
pub mod recommender;
pub mod services;
pub mod state;
pub mod task_pool;
