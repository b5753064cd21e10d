mod error;
pub mod wire;

pub use error::{ApiError, ParseError};
