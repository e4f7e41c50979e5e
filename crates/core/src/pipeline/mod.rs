pub mod camera_source;
pub mod controller;
pub mod event_sink;
pub mod frame_analyzer;
pub mod infrastructure;
pub mod permission;
