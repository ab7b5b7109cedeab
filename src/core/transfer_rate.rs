use std::{fmt::Display, time::Duration};

use size::Size;

/// Amount of data moved over a period of time.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct TransferRate(pub Size, pub Duration);

impl Display for TransferRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let size_per_second = Size::from_bytes(self.bps().round() as u64);
        write!(f, "{}/s", size_per_second)
    }
}

impl TransferRate {
    pub const EMPTY: Self = Self(Size::from_const(0), Duration::ZERO);

    /// Bytes per second, zero when no time has elapsed.
    pub fn bps(&self) -> f64 {
        let seconds = self.1.as_secs_f64();
        if seconds == 0.0 {
            return 0.0;
        }
        (self.0.bytes() as f64) / seconds
    }
}
