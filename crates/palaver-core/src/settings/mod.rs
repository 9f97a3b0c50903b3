pub mod client_settings;
pub mod client_settings_repository;
pub mod json_file;

pub use client_settings::{API_URL_ENV, ClientSettings, DEFAULT_API_BASE_URL};
pub use client_settings_repository::{ClientSettingsJsonRepository, ClientSettingsRepository};
