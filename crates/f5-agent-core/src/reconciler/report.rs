use std::fmt;
use std::time::Duration;

/// What one reconciliation cycle saw and did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Ports owned by this host
    pub examined: usize,
    /// VLAN already carried the desired tag
    pub in_sync: usize,
    /// VLAN tag rewritten
    pub corrected: usize,
    /// Missing VLAN created
    pub created: usize,
    /// Missing VLAN left in place (report policy)
    pub missing: usize,
    /// No segment on a configured physical network
    pub mismatched: usize,
    /// Port store or device call failed
    pub failed: usize,
    /// No binding level of ours, or no VLAN segment
    pub skipped: usize,
    /// Pending update notifications when the cycle started
    pub pending_updates: usize,
    /// Pending delete notifications when the cycle started
    pub pending_deletes: usize,
    pub devices_up: Vec<String>,
    pub devices_down: Vec<String>,
    /// Whether `update_device_list` was called and succeeded
    pub device_list_reported: bool,
    pub elapsed: Duration,
}

impl CycleReport {
    /// Device mutations issued during the cycle
    pub fn mutations(&self) -> usize {
        self.corrected + self.created
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "examined={} in_sync={} corrected={} created={} missing={} mismatched={} \
             failed={} skipped={} updated={} deleted={} elapsed={:.3}s",
            self.examined,
            self.in_sync,
            self.corrected,
            self.created,
            self.missing,
            self.mismatched,
            self.failed,
            self.skipped,
            self.pending_updates,
            self.pending_deletes,
            self.elapsed.as_secs_f64()
        )
    }
}
