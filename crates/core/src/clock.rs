use chrono::Timelike;

/// Source of the current local hour for schedule-window checks. Injectable
/// so policy evaluation stays deterministic under test.
pub trait Clock: Send + Sync {
    /// Current hour on the local 0-23 clock.
    fn local_hour(&self) -> u8;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn local_hour(&self) -> u8 {
        chrono::Local::now().hour() as u8
    }
}

/// Clock pinned to a single hour.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub u8);

impl Clock for FixedClock {
    fn local_hour(&self) -> u8 {
        self.0
    }
}
