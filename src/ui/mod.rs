//! User interface rendering and input handling.
//!
//! - **keymapper**: crossterm key events to the crate's own key type,
//!   plus recognition of global commands
//! - **layout**: fixed screen arrangement of the three panes
//! - **renderer**: draws the panes, borders and status line

pub mod keymapper;
pub mod layout;
pub mod renderer;

pub use keymapper::KeyMapper;
pub use layout::Layout;
pub use renderer::Renderer;
