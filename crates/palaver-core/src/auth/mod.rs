pub mod auth_api;
pub mod credentials_repository;
pub mod session;

pub use auth_api::{AccountInfo, AuthApi};
pub use credentials_repository::{CredentialsJsonRepository, CredentialsRepository};
pub use session::{Actor, AuthSession, Credentials};
