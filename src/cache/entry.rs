//! Cache Entry Module
//!
//! Defines the record stored for each key, with TTL and access metadata.

// == Timed Entry ==
/// A cached value plus the metadata eviction and expiry decisions need.
#[derive(Debug, Clone)]
pub struct TimedEntry<V> {
    /// The stored value
    pub value: V,
    /// Insertion timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Time to live in milliseconds, fixed at insertion
    pub ttl_ms: u64,
    /// Number of successful reads
    pub access_count: u64,
    /// Timestamp of the last successful read, `created_at` until then
    pub last_accessed_at: u64,
    /// Logical insertion order, breaks FIFO/LFU ties
    pub(crate) inserted_tick: u64,
    /// Logical order of the last insert or read, breaks LRU ties
    pub(crate) touched_tick: u64,
}

impl<V> TimedEntry<V> {
    // == Constructor ==
    /// Creates an entry inserted at `now` that lives for `ttl_ms`.
    pub fn new(value: V, now: u64, ttl_ms: u64, tick: u64) -> Self {
        Self {
            value,
            created_at: now,
            ttl_ms,
            access_count: 0,
            last_accessed_at: now,
            inserted_tick: tick,
            touched_tick: tick,
        }
    }

    // == Is Expired ==
    /// An entry is live while `now - created_at <= ttl_ms`.
    ///
    /// A clock that went backwards counts as zero elapsed time.
    pub fn is_expired(&self, now: u64) -> bool {
        now.saturating_sub(self.created_at) > self.ttl_ms
    }

    // == Record Access ==
    /// Bumps the access counter and recency after a successful read.
    pub fn record_access(&mut self, now: u64, tick: u64) {
        self.access_count += 1;
        self.last_accessed_at = now;
        self.touched_tick = tick;
    }

    // == Time To Live ==
    /// Remaining lifetime in milliseconds, 0 once expired.
    pub fn ttl_remaining_ms(&self, now: u64) -> u64 {
        let expires_at = self.created_at.saturating_add(self.ttl_ms);
        expires_at.saturating_sub(now)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_creation() {
        let entry = TimedEntry::new("test_value", 1_000, 5_000, 0);

        assert_eq!(entry.value, "test_value");
        assert_eq!(entry.created_at, 1_000);
        assert_eq!(entry.last_accessed_at, 1_000);
        assert_eq!(entry.access_count, 0);
        assert!(!entry.is_expired(1_000));
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let entry = TimedEntry::new("test", 1_000, 1_000, 0);

        // Exactly at the TTL the entry is still live
        assert!(!entry.is_expired(2_000));
        assert!(entry.is_expired(2_001));
    }

    #[test]
    fn test_clock_going_backwards_keeps_entry_live() {
        let entry = TimedEntry::new("test", 5_000, 10, 0);
        assert!(!entry.is_expired(1_000));
    }

    #[test]
    fn test_record_access() {
        let mut entry = TimedEntry::new(42, 1_000, 60_000, 0);

        entry.record_access(1_500, 1);
        entry.record_access(2_500, 2);

        assert_eq!(entry.access_count, 2);
        assert_eq!(entry.last_accessed_at, 2_500);
        assert_eq!(entry.created_at, 1_000);
    }

    #[test]
    fn test_ttl_remaining() {
        let entry = TimedEntry::new((), 1_000, 10_000, 0);

        assert_eq!(entry.ttl_remaining_ms(1_000), 10_000);
        assert_eq!(entry.ttl_remaining_ms(4_000), 7_000);
        assert_eq!(entry.ttl_remaining_ms(20_000), 0);
    }
}
