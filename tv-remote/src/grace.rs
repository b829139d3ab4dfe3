//! Power-off grace window

use std::time::{Duration, Instant};

/// Deadline before which the TV is considered to be shutting down
///
/// A TV keeps answering for several seconds after a power-off; keys sent in
/// that window can wake it up again or change its volume on the way down.
#[derive(Debug, Clone, Default)]
pub struct GraceTimer {
    deadline: Option<Instant>,
}

impl GraceTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) the window at `now + duration`
    pub fn begin(&mut self, duration: Duration) {
        let deadline = Instant::now() + duration;
        // Only a later power-off may move the deadline
        if self.deadline.map_or(true, |current| deadline > current) {
            self.deadline = Some(deadline);
        }
    }

    pub fn is_active(&self) -> bool {
        self.deadline.map_or(false, |deadline| Instant::now() < deadline)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_inactive_until_begun() {
        assert!(!GraceTimer::new().is_active());
    }

    #[test]
    fn test_expires() {
        let mut timer = GraceTimer::new();
        timer.begin(Duration::from_millis(30));
        assert!(timer.is_active());
        thread::sleep(Duration::from_millis(60));
        assert!(!timer.is_active());
        assert!(timer.deadline().is_some());
    }

    #[test]
    fn test_restart_extends() {
        let mut timer = GraceTimer::new();
        timer.begin(Duration::from_secs(15));
        let first = timer.deadline().unwrap();
        thread::sleep(Duration::from_millis(5));
        timer.begin(Duration::from_secs(15));
        assert!(timer.deadline().unwrap() > first);
    }

    #[test]
    fn test_shorter_window_does_not_shrink() {
        let mut timer = GraceTimer::new();
        timer.begin(Duration::from_secs(15));
        let first = timer.deadline().unwrap();
        timer.begin(Duration::from_millis(1));
        assert_eq!(timer.deadline().unwrap(), first);
    }
}
