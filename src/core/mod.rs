pub mod error;
pub mod value;

pub use error::{BusError, Result};
pub use value::Value;
