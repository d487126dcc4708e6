//! Auto-scroll intent: follow new messages unless the reader has scrolled away from the bottom.

/// Distance from the bottom (device-independent pixels) beyond which following pauses.
pub const PAUSE_DISTANCE: f64 = 200.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScrollState {
    /// New messages scroll the view to the newest one.
    #[default]
    Following,
    /// The reader is looking at older messages; leave the view alone.
    Paused,
}

impl ScrollState {
    /// State after a scroll-position sample.
    pub fn observe(distance_from_bottom: f64) -> Self {
        if distance_from_bottom > PAUSE_DISTANCE {
            ScrollState::Paused
        } else {
            ScrollState::Following
        }
    }

    pub fn is_following(self) -> bool {
        self == ScrollState::Following
    }
}
