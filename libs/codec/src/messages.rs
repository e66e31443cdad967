//! Auction protocol message definitions.
//!
//! Every packet is a one-byte type tag followed by a fixed-size record for
//! that tag. Records are `#[repr(C)]` zerocopy structs with numeric fields
//! first so the layout carries no padding. String fields are fixed-capacity
//! NUL-terminated ASCII; numeric fields are little-endian `u32` and `f32`.
//! Field widths are a bit-exact contract shared with the client.

use zerocopy::{AsBytes, FromBytes, FromZeroes};

/// Capacity of a client unique-name field, terminator included.
pub const NAME_CAP: usize = 32;
/// Capacity of a textual IP address field.
pub const ADDR_CAP: usize = 32;
/// Capacity of a textual port field.
pub const PORT_CAP: usize = 8;
/// Capacity of an item description field.
pub const DESC_CAP: usize = 128;
/// Capacity of a denial-reason field.
pub const REASON_CAP: usize = 64;

/// Message type tags. The set is closed; anything else is malformed.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Register = 1,
    Registered = 2,
    Unregistered = 3,
    Deregister = 4,
    DeregConf = 5,
    DeregDenied = 6,
    Offer = 7,
    OfferConf = 8,
    OfferDenied = 9,
    Bid = 10,
    NewItem = 11,
    Highest = 12,
    BidOver = 13,
    Win = 14,
    SoldTo = 15,
    NotSold = 16,
}

impl MessageType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(MessageType::Register),
            2 => Some(MessageType::Registered),
            3 => Some(MessageType::Unregistered),
            4 => Some(MessageType::Deregister),
            5 => Some(MessageType::DeregConf),
            6 => Some(MessageType::DeregDenied),
            7 => Some(MessageType::Offer),
            8 => Some(MessageType::OfferConf),
            9 => Some(MessageType::OfferDenied),
            10 => Some(MessageType::Bid),
            11 => Some(MessageType::NewItem),
            12 => Some(MessageType::Highest),
            13 => Some(MessageType::BidOver),
            14 => Some(MessageType::Win),
            15 => Some(MessageType::SoldTo),
            16 => Some(MessageType::NotSold),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MessageType::Register => "register",
            MessageType::Registered => "registered",
            MessageType::Unregistered => "unregistered",
            MessageType::Deregister => "deregister",
            MessageType::DeregConf => "dereg-conf",
            MessageType::DeregDenied => "dereg-denied",
            MessageType::Offer => "offer",
            MessageType::OfferConf => "offer-conf",
            MessageType::OfferDenied => "offer-denied",
            MessageType::Bid => "bid",
            MessageType::NewItem => "new-item",
            MessageType::Highest => "highest",
            MessageType::BidOver => "bid-over",
            MessageType::Win => "win",
            MessageType::SoldTo => "sold-to",
            MessageType::NotSold => "not-sold",
        }
    }

    /// Size in bytes of the record that follows this tag.
    pub fn record_size(&self) -> usize {
        use std::mem::size_of;
        match self {
            MessageType::Register | MessageType::Registered => size_of::<RegisterRecord>(),
            MessageType::Unregistered
            | MessageType::DeregDenied
            | MessageType::OfferDenied => size_of::<DeniedRecord>(),
            MessageType::Deregister | MessageType::DeregConf => size_of::<RequestRecord>(),
            MessageType::Offer => size_of::<OfferRecord>(),
            MessageType::OfferConf => size_of::<OfferConfRecord>(),
            MessageType::Bid | MessageType::BidOver => size_of::<AmountRecord>(),
            MessageType::NewItem => size_of::<NewItemRecord>(),
            MessageType::Highest => size_of::<HighestRecord>(),
            MessageType::Win | MessageType::SoldTo => size_of::<SettleRecord>(),
            MessageType::NotSold => size_of::<NotSoldRecord>(),
        }
    }

    /// Whole-packet size: tag byte plus record.
    pub fn packet_size(&self) -> usize {
        1 + self.record_size()
    }
}

/// `register` and `registered`: both echo the client-supplied identity.
#[repr(C)]
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
pub struct RegisterRecord {
    pub req_num: u32,
    pub name: [u8; NAME_CAP],
    pub ip: [u8; ADDR_CAP],
    pub port: [u8; PORT_CAP],
}

/// `unregistered`, `dereg-denied` and `offer-denied`: a refusal with a reason.
#[repr(C)]
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
pub struct DeniedRecord {
    pub req_num: u32,
    pub reason: [u8; REASON_CAP],
}

/// `deregister` and `dereg-conf` carry only the request number.
#[repr(C)]
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
pub struct RequestRecord {
    pub req_num: u32,
}

/// `offer`: a new item with a price floor.
#[repr(C)]
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
pub struct OfferRecord {
    pub req_num: u32,
    pub minimum: f32,
    pub description: [u8; DESC_CAP],
}

/// `offer-conf`: the accepted offer with its server-assigned item id.
#[repr(C)]
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
pub struct OfferConfRecord {
    pub req_num: u32,
    pub item_id: u32,
    pub minimum: f32,
    pub description: [u8; DESC_CAP],
}

/// `bid` and `bid-over`: an item id paired with an amount.
#[repr(C)]
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
pub struct AmountRecord {
    pub item_id: u32,
    pub amount: f32,
}

/// `new-item`: auction-open broadcast. The port field travels empty.
#[repr(C)]
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
pub struct NewItemRecord {
    pub item_id: u32,
    pub minimum: f32,
    pub description: [u8; DESC_CAP],
    pub port: [u8; PORT_CAP],
}

/// `highest`: accepted-bid broadcast.
#[repr(C)]
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
pub struct HighestRecord {
    pub item_id: u32,
    pub amount: f32,
    pub description: [u8; DESC_CAP],
}

/// `win` and `sold-to`: settlement notices naming the counterparty.
#[repr(C)]
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
pub struct SettleRecord {
    pub item_id: u32,
    pub amount: f32,
    pub name: [u8; NAME_CAP],
    pub ip: [u8; ADDR_CAP],
    pub port: [u8; PORT_CAP],
}

/// `not-sold`: the auction closed without a valid bid.
#[repr(C)]
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
pub struct NotSoldRecord {
    pub item_id: u32,
    pub reason: [u8; REASON_CAP],
}

/// Decoded protocol message with owned field values.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Register { req_num: u32, name: String, ip: String, port: String },
    Registered { req_num: u32, name: String, ip: String, port: String },
    Unregistered { req_num: u32, reason: String },
    Deregister { req_num: u32 },
    DeregConf { req_num: u32 },
    DeregDenied { req_num: u32, reason: String },
    Offer { req_num: u32, minimum: f32, description: String },
    OfferConf { req_num: u32, item_id: u32, minimum: f32, description: String },
    OfferDenied { req_num: u32, reason: String },
    Bid { item_id: u32, amount: f32 },
    NewItem { item_id: u32, minimum: f32, description: String },
    Highest { item_id: u32, amount: f32, description: String },
    BidOver { item_id: u32, amount: f32 },
    Win { item_id: u32, amount: f32, name: String, ip: String },
    SoldTo { item_id: u32, amount: f32, name: String, ip: String },
    NotSold { item_id: u32, reason: String },
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Register { .. } => MessageType::Register,
            Message::Registered { .. } => MessageType::Registered,
            Message::Unregistered { .. } => MessageType::Unregistered,
            Message::Deregister { .. } => MessageType::Deregister,
            Message::DeregConf { .. } => MessageType::DeregConf,
            Message::DeregDenied { .. } => MessageType::DeregDenied,
            Message::Offer { .. } => MessageType::Offer,
            Message::OfferConf { .. } => MessageType::OfferConf,
            Message::OfferDenied { .. } => MessageType::OfferDenied,
            Message::Bid { .. } => MessageType::Bid,
            Message::NewItem { .. } => MessageType::NewItem,
            Message::Highest { .. } => MessageType::Highest,
            Message::BidOver { .. } => MessageType::BidOver,
            Message::Win { .. } => MessageType::Win,
            Message::SoldTo { .. } => MessageType::SoldTo,
            Message::NotSold { .. } => MessageType::NotSold,
        }
    }
}

/// Packs a string into a fixed field, truncating to capacity minus one so a
/// trailing NUL is always present.
pub fn pack_str<const N: usize>(value: &str) -> [u8; N] {
    let mut field = [0u8; N];
    let bytes = value.as_bytes();
    let len = bytes.len().min(N - 1);
    field[..len].copy_from_slice(&bytes[..len]);
    field
}

/// Reads a fixed field back out, stopping at the first NUL.
pub fn unpack_str(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn tag_set_is_closed() {
        assert_eq!(MessageType::from_u8(0), None);
        assert_eq!(MessageType::from_u8(17), None);
        for tag in 1..=16u8 {
            let kind = MessageType::from_u8(tag).expect("tag in closed set");
            assert_eq!(kind as u8, tag);
        }
    }

    #[test]
    fn records_carry_no_padding() {
        assert_eq!(size_of::<RegisterRecord>(), 4 + NAME_CAP + ADDR_CAP + PORT_CAP);
        assert_eq!(size_of::<DeniedRecord>(), 4 + REASON_CAP);
        assert_eq!(size_of::<RequestRecord>(), 4);
        assert_eq!(size_of::<OfferRecord>(), 8 + DESC_CAP);
        assert_eq!(size_of::<OfferConfRecord>(), 12 + DESC_CAP);
        assert_eq!(size_of::<AmountRecord>(), 8);
        assert_eq!(size_of::<NewItemRecord>(), 8 + DESC_CAP + PORT_CAP);
        assert_eq!(size_of::<HighestRecord>(), 8 + DESC_CAP);
        assert_eq!(size_of::<SettleRecord>(), 8 + NAME_CAP + ADDR_CAP + PORT_CAP);
        assert_eq!(size_of::<NotSoldRecord>(), 4 + REASON_CAP);
    }

    #[test]
    fn pack_str_truncates_with_trailing_nul() {
        let long = "x".repeat(100);
        let field: [u8; NAME_CAP] = pack_str(&long);
        assert_eq!(field[NAME_CAP - 1], 0);
        assert_eq!(unpack_str(&field), "x".repeat(NAME_CAP - 1));
    }

    #[test]
    fn unpack_str_stops_at_nul() {
        let field: [u8; 8] = *b"abc\0def\0";
        assert_eq!(unpack_str(&field), "abc");
    }
}
