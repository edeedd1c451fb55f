pub mod app_paths;
pub mod logging;

pub use app_paths::AppPaths;
