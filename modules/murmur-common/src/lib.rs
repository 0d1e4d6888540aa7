pub mod cancel;
pub mod config;
pub mod error;
pub mod types;

pub use cancel::CancelToken;
pub use config::Config;
pub use error::MurmurError;
pub use types::Record;
