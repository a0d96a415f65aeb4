pub mod error;

pub use error::{Error, ErrorList, Result};
