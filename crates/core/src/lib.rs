pub mod config;
pub mod error;
pub mod row;
pub mod value;

pub use config::OverseerConfig;
pub use error::*;
pub use row::Row;
pub use value::Value;
