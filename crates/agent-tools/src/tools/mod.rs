mod current_time;
mod echo;
mod fn_tool;

pub use current_time::CurrentTimeTool;
pub use echo::EchoTool;
pub use fn_tool::FnTool;
