pub mod config;
pub mod merge;
pub mod merge_ui;
