pub mod config;
pub mod dynamic;
pub mod event;
pub mod sequence;
pub mod song;
