//! CLI command handling

pub mod log;
pub mod output;
pub mod simulate;
pub mod token;

pub use log::*;
pub use output::*;
pub use simulate::*;
pub use token::*;
