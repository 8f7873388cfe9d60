use std::rc::Rc;

pub const DEFAULT_FIRST_DELAY_SECS: u64 = 180;
pub const DEFAULT_REPEAT_INTERVAL_SECS: u64 = 120;

/// Whether a notification is due once `elapsed_secs` seconds have passed.
///
/// Due at `first_delay` and then every `repeat_interval` seconds after it.
/// Never due at zero. A zero `repeat_interval` means only the first one fires.
pub fn is_due(elapsed_secs: u64, first_delay: u64, repeat_interval: u64) -> bool {
    if elapsed_secs == 0 || elapsed_secs < first_delay {
        return false;
    }
    if elapsed_secs == first_delay {
        return true;
    }
    if repeat_interval == 0 {
        return false;
    }
    (elapsed_secs - first_delay) % repeat_interval == 0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationSchedule {
    pub first_delay: u64,
    pub repeat_interval: u64,
}

impl Default for NotificationSchedule {
    fn default() -> Self {
        Self {
            first_delay: DEFAULT_FIRST_DELAY_SECS,
            repeat_interval: DEFAULT_REPEAT_INTERVAL_SECS,
        }
    }
}

impl NotificationSchedule {
    pub fn new(first_delay: u64, repeat_interval: u64) -> Self {
        Self {
            first_delay,
            repeat_interval,
        }
    }

    pub fn is_due(&self, elapsed_secs: u64) -> bool {
        is_due(elapsed_secs, self.first_delay, self.repeat_interval)
    }
}

/// Fixed, non-empty, cyclic list of messages shared by every widget.
#[derive(Debug, Clone)]
pub struct NotificationSet {
    messages: Rc<[String]>,
}

impl NotificationSet {
    /// `None` if `messages` is empty.
    pub fn new(messages: Vec<String>) -> Option<Self> {
        if messages.is_empty() {
            return None;
        }
        Some(Self {
            messages: messages.into(),
        })
    }

    /// Message at `index`, wrapping around the end of the set.
    pub fn get(&self, index: usize) -> &str {
        &self.messages[index % self.messages.len()]
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
