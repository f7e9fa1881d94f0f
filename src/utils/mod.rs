pub mod channels;

pub use channels::{PlaybackCompletion, SessionChannels};
