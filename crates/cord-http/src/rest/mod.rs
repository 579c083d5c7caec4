//! REST executor

mod error;
mod executor;

pub use error::{ApiErrorMessage, RestError, RestResult, StatusError};
pub use executor::{route_key, RestClient};
