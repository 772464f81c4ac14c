pub mod file_repository;
pub mod memory_store;
pub mod settings_repository;
pub mod sqlite_store;

pub use file_repository::*;
pub use memory_store::*;
pub use settings_repository::*;
pub use sqlite_store::*;

/// Everything the services need from persistence.
pub trait Store: FileRepository + SettingsRepository {}

impl<T: FileRepository + SettingsRepository> Store for T {}
