pub mod frame_source;
pub mod preview_sink;
