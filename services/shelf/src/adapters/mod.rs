pub mod db;
pub mod http;
pub mod migrations;
pub mod settings;

pub use db::SqliteStore;
pub use http::HttpFetcher;
pub use settings::JsonSettingsStore;
