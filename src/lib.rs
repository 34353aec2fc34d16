mod engine;
mod error;
mod model;
mod player;
mod song_files;
mod transport;
mod util;

pub use engine::console::*;
pub use engine::*;
pub use error::*;
pub use model::config::*;
pub use model::dynamic::*;
pub use model::event::{EventKind, TimedEvent, TrackRef};
pub use model::sequence::*;
pub use model::song::*;
pub use player::*;
pub use song_files::*;
pub use transport::*;
pub use util::*;
