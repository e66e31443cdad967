//! Auction items.

use std::time::{Duration, Instant};

/// One offered good with a price floor and a scheduled expiry.
///
/// `current_highest` starts at `minimum` and only moves up; the bidder key
/// is empty exactly while no bid has been accepted. The seller can never be
/// the highest bidder.
#[derive(Debug, Clone)]
pub struct Item {
    pub id: u32,
    pub description: String,
    pub minimum: f32,
    pub current_highest: f32,
    pub seller: String,
    pub highest_bidder: String,
    pub started_at: Instant,
    pub duration: Duration,
}

impl Item {
    pub fn new(
        id: u32,
        description: String,
        minimum: f32,
        seller: String,
        duration: Duration,
    ) -> Self {
        Self {
            id,
            description,
            minimum,
            current_highest: minimum,
            seller,
            highest_bidder: String::new(),
            started_at: Instant::now(),
            duration,
        }
    }

    /// Whether any bid has been accepted.
    pub fn has_bids(&self) -> bool {
        self.current_highest != self.minimum
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Backdates the start so `elapsed()` resumes where a prior run left
    /// off. Used when reviving auctions from the snapshot.
    pub fn backdate(&mut self, elapsed: Duration) {
        self.started_at = Instant::now()
            .checked_sub(elapsed)
            .unwrap_or_else(Instant::now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> Item {
        Item::new(1, "Mug".into(), 5.0, "127.0.0.1:4000".into(), Duration::from_secs(3))
    }

    #[test]
    fn fresh_item_has_no_bids() {
        let item = item();
        assert!(!item.has_bids());
        assert_eq!(item.current_highest, item.minimum);
        assert!(item.highest_bidder.is_empty());
    }

    #[test]
    fn backdate_resumes_elapsed_time() {
        let mut item = item();
        item.backdate(Duration::from_secs(2));
        let elapsed = item.elapsed();
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_secs(3));
    }
}
