pub mod bitstream;
pub mod config;
pub mod ec;
pub mod layout;
pub mod metadata;
pub mod palette;
pub mod utils;
pub mod wire;

pub use bitstream::*;
pub use config::*;
pub use layout::*;
pub use metadata::*;
pub use palette::*;
pub use utils::*;
