// doorwatch-api: wire formats and HTTP clients for the doorwatch pipeline
// (smart-lock poll payloads, remote image classifier)

pub mod classifier;
pub mod error;
pub mod nuki;
pub mod transport;

pub use classifier::{ClassifierClient, PredictionResponse};
pub use error::Error;
pub use transport::{TlsMode, TransportConfig};
