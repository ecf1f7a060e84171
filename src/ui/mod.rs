//! User interface rendering and input handling.
//!
//! - **window**: off-screen cell rectangles placed on the screen
//! - **renderer**: the `Display` trait and its crossterm implementation
//! - **layout**: console / command strip / menu placement
//! - **menu**: the column-major command menu
//! - **keymapper**: key events to pty bytes
//! - **router**: Menu / Console input dispatch

pub mod keymapper;
pub mod layout;
pub mod menu;
pub mod renderer;
pub mod router;
pub mod window;
