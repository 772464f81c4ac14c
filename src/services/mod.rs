pub mod analytics;
pub mod approval;
pub mod archive;
pub mod lifecycle;
pub mod normalizer;
pub mod review;
pub mod settings;
pub mod transport;
pub mod upload;

pub use analytics::*;
pub use approval::*;
pub use archive::*;
pub use lifecycle::*;
pub use normalizer::*;
pub use review::*;
pub use settings::*;
pub use transport::*;
pub use upload::*;
