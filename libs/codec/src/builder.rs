//! Packet construction.
//!
//! Encoding never fails: overlong strings truncate into their fixed fields
//! and every record is emitted at its declared size behind the tag byte.

use zerocopy::AsBytes;

use crate::messages::{
    pack_str, AmountRecord, DeniedRecord, HighestRecord, Message, NewItemRecord, NotSoldRecord,
    OfferConfRecord, OfferRecord, RegisterRecord, RequestRecord, SettleRecord,
};

impl Message {
    /// Serializes the message as a tag byte followed by its fixed record.
    pub fn encode(&self) -> Vec<u8> {
        let kind = self.message_type();
        let mut packet = Vec::with_capacity(kind.packet_size());
        packet.push(kind as u8);
        match self {
            Message::Register { req_num, name, ip, port }
            | Message::Registered { req_num, name, ip, port } => {
                let record = RegisterRecord {
                    req_num: *req_num,
                    name: pack_str(name),
                    ip: pack_str(ip),
                    port: pack_str(port),
                };
                packet.extend_from_slice(record.as_bytes());
            }
            Message::Unregistered { req_num, reason }
            | Message::DeregDenied { req_num, reason }
            | Message::OfferDenied { req_num, reason } => {
                let record = DeniedRecord {
                    req_num: *req_num,
                    reason: pack_str(reason),
                };
                packet.extend_from_slice(record.as_bytes());
            }
            Message::Deregister { req_num } | Message::DeregConf { req_num } => {
                let record = RequestRecord { req_num: *req_num };
                packet.extend_from_slice(record.as_bytes());
            }
            Message::Offer { req_num, minimum, description } => {
                let record = OfferRecord {
                    req_num: *req_num,
                    minimum: *minimum,
                    description: pack_str(description),
                };
                packet.extend_from_slice(record.as_bytes());
            }
            Message::OfferConf { req_num, item_id, minimum, description } => {
                let record = OfferConfRecord {
                    req_num: *req_num,
                    item_id: *item_id,
                    minimum: *minimum,
                    description: pack_str(description),
                };
                packet.extend_from_slice(record.as_bytes());
            }
            Message::Bid { item_id, amount } | Message::BidOver { item_id, amount } => {
                let record = AmountRecord {
                    item_id: *item_id,
                    amount: *amount,
                };
                packet.extend_from_slice(record.as_bytes());
            }
            Message::NewItem { item_id, minimum, description } => {
                let record = NewItemRecord {
                    item_id: *item_id,
                    minimum: *minimum,
                    description: pack_str(description),
                    port: [0; crate::messages::PORT_CAP],
                };
                packet.extend_from_slice(record.as_bytes());
            }
            Message::Highest { item_id, amount, description } => {
                let record = HighestRecord {
                    item_id: *item_id,
                    amount: *amount,
                    description: pack_str(description),
                };
                packet.extend_from_slice(record.as_bytes());
            }
            Message::Win { item_id, amount, name, ip }
            | Message::SoldTo { item_id, amount, name, ip } => {
                let record = SettleRecord {
                    item_id: *item_id,
                    amount: *amount,
                    name: pack_str(name),
                    ip: pack_str(ip),
                    port: [0; crate::messages::PORT_CAP],
                };
                packet.extend_from_slice(record.as_bytes());
            }
            Message::NotSold { item_id, reason } => {
                let record = NotSoldRecord {
                    item_id: *item_id,
                    reason: pack_str(reason),
                };
                packet.extend_from_slice(record.as_bytes());
            }
        }
        debug_assert_eq!(packet.len(), kind.packet_size());
        packet
    }
}
