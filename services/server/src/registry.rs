//! Shared auction state: the connection table and the live item table.

use std::collections::HashMap;

use crate::connection::Connection;
use crate::item::Item;

/// How many items one client may have live as seller.
pub const MAX_LIVE_OFFERS: usize = 3;

/// Everything the auction lock guards.
///
/// Both tables sit behind a single mutex, and every outbound message derived
/// from them is sent while the same guard is held, so observers never see a
/// half-applied auction.
#[derive(Debug, Default)]
pub struct ServerState {
    pub connections: HashMap<String, Connection>,
    pub items: HashMap<u32, Item>,
}

/// What a bid attempt did. The caller turns this into pushes or log lines.
#[derive(Debug, Clone, PartialEq)]
pub enum BidOutcome {
    /// The item now carries this bid.
    Accepted,
    /// No live auction under that id.
    UnknownItem,
    /// The amount does not beat the standing highest.
    TooLow { current: f32 },
    /// Sellers cannot bid on their own items.
    OwnItem,
}

impl ServerState {
    /// Whether `name` is already held by a connection other than `key`.
    pub fn name_taken_by_other(&self, name: &str, key: &str) -> bool {
        self.connections
            .iter()
            .any(|(other_key, conn)| conn.name() == name && other_key != key)
    }

    /// Whether `key` currently sells any live item.
    pub fn is_seller(&self, key: &str) -> bool {
        self.items.values().any(|item| item.seller == key)
    }

    /// Whether `key` is the standing highest bidder on any live item.
    pub fn is_highest_bidder(&self, key: &str) -> bool {
        self.items.values().any(|item| item.highest_bidder == key)
    }

    /// Live items sold by `key`.
    pub fn live_offer_count(&self, key: &str) -> usize {
        self.items.values().filter(|item| item.seller == key).count()
    }

    /// Applies one bid, upholding the price-floor and own-item rules.
    pub fn apply_bid(&mut self, item_id: u32, amount: f32, bidder: &str) -> BidOutcome {
        let Some(item) = self.items.get_mut(&item_id) else {
            return BidOutcome::UnknownItem;
        };
        if amount <= item.current_highest {
            return BidOutcome::TooLow {
                current: item.current_highest,
            };
        }
        if item.seller == bidder {
            return BidOutcome::OwnItem;
        }
        item.current_highest = amount;
        item.highest_bidder = bidder.to_string();
        BidOutcome::Accepted
    }
}
