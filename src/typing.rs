//! Pause timing for simulated typing in Auto mode.

use rand::Rng;
use std::time::Duration;

/// How long Auto mode waits between keystrokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypingConfig {
    /// Use a random pause in `[min, max]` instead of the fixed `pause`.
    pub enabled: bool,
    pub min: Duration,
    pub max: Duration,
    pub pause: Duration,
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min: Duration::from_millis(10),
            max: Duration::from_millis(150),
            pause: Duration::from_millis(10),
        }
    }
}

impl TypingConfig {
    /// Random pauses between `min` and `max`.
    pub fn simulated(min: Duration, max: Duration) -> Self {
        Self {
            enabled: true,
            min,
            max,
            ..Self::default()
        }
    }

    /// The pause before the next keystroke.
    pub fn next_pause(&self) -> Duration {
        if !self.enabled {
            return self.pause;
        }
        let (low, high) = if self.min <= self.max {
            (self.min, self.max)
        } else {
            (self.max, self.min)
        };
        let ms = rand::thread_rng().gen_range(low.as_millis()..=high.as_millis());
        Duration::from_millis(ms as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_pause_when_disabled() {
        let typing = TypingConfig {
            pause: Duration::from_millis(42),
            ..TypingConfig::default()
        };
        assert_eq!(typing.next_pause(), Duration::from_millis(42));
    }

    #[test]
    fn test_random_pause_in_range() {
        let typing = TypingConfig::simulated(Duration::from_millis(20), Duration::from_millis(40));
        for _ in 0..200 {
            let pause = typing.next_pause();
            assert!(pause >= Duration::from_millis(20) && pause <= Duration::from_millis(40));
        }
    }

    #[test]
    fn test_inverted_range() {
        let typing = TypingConfig::simulated(Duration::from_millis(40), Duration::from_millis(20));
        let pause = typing.next_pause();
        assert!(pause >= Duration::from_millis(20) && pause <= Duration::from_millis(40));
    }
}
