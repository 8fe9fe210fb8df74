pub mod ansi;
pub mod line_map;
pub mod overlay;
pub mod spans;
pub mod sticky;
