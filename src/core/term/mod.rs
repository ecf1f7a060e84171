//! Terminal emulation for the console view.
//!
//! - **state**: the virtual screen grid, cursor and scroll region
//! - **parser**: the byte-stream interpreter that drives it

pub mod parser;
pub mod state;

pub use parser::Interpreter;
pub use state::VirtualScreen;
