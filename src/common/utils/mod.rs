mod cast;
mod error;

pub use cast::*;
pub use error::*;
