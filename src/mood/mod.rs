// Mood scoring module
// Maps extracted audio features to a fixed 5-dimensional mood vector

pub mod scorer;

pub use scorer::{score_mood, MoodError, MoodVector};
