pub mod errors;
pub mod extractors;

pub use errors::*;
pub use extractors::*;
