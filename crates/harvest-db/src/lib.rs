pub mod config;
pub mod database;
pub mod frontier_repository;
pub mod run_log_repository;

pub use config::DatabaseConfig;
pub use database::Database;
pub use frontier_repository::FrontierRepository;
pub use run_log_repository::RunLogRepository;
