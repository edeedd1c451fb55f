pub mod app_state;
pub mod config;
pub mod data;
pub mod database;
pub mod error;
pub mod history;
pub mod services;
pub mod sql;
pub mod storage;
pub mod ui;
pub mod utils;

pub use error::{AppError, AppResult};
