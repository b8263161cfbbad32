/// Point-in-time counts of the three stores.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub ready: u64,
    pub delayed: u64,
    pub leased: u64,
    /// Scheduled time of the next delayed message, if any.
    pub next_delayed_at_ns: Option<u64>,
    /// Expiry of the earliest active lease, if any.
    pub next_lease_expiry_ns: Option<u64>,
}

impl QueueStats {
    /// Messages still in circulation (not yet acknowledged).
    pub fn depth(&self) -> u64 {
        self.ready + self.delayed + self.leased
    }
}
