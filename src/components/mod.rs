pub mod filter;
pub mod help;
pub mod picker;
pub mod preview;
pub mod status_bar;
pub mod tree;
