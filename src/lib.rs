pub mod config;
pub mod util;
pub mod wfs;

// vim:ts=2 sw=2
