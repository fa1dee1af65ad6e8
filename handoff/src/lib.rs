pub mod api;
pub mod clock;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod live;
pub mod models;
pub mod services;
