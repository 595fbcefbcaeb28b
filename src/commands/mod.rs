pub mod completions;
pub mod list;
