pub mod controls;
pub mod style;

pub use controls::{ControlRef, ControlRegistry};
pub use style::{ToolStyle, DEFAULT_TOOL_STYLE};
