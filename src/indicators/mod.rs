// Breakout channel calculation
pub mod channel;

pub use channel::channel_bounds;
