pub mod file;
pub mod settings;
pub mod table;

pub use file::*;
pub use settings::*;
pub use table::*;
