/// Simulated timeline used by every deadline inside the deck.
///
/// Deadlines are compared against `now()`, never against the wall clock, so tests can
/// step time explicitly.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameClock {
    now: f64,
    frame: u64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances by `dt` seconds. Negative or non-finite deltas are ignored.
    pub fn advance(&mut self, dt: f32) -> f64 {
        if dt.is_finite() && dt > 0.0 {
            self.now += dt as f64;
        }
        self.frame = self.frame.wrapping_add(1);
        self.now
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_clock_ignores_bad_deltas() {
        let mut clock = FrameClock::new();
        clock.advance(0.5);
        clock.advance(-1.0);
        clock.advance(f32::NAN);
        assert!((clock.now() - 0.5).abs() < 1e-9);
        assert_eq!(clock.frame(), 3);
    }
}
