//! Packet decoding.
//!
//! Validates the leading tag against the closed tag set, then reads the
//! fixed-size record behind it. Bytes past the record are ignored, which
//! lets receive buffers be handed in whole.

use std::mem::size_of;

use zerocopy::FromBytes;

use crate::error::{CodecError, CodecResult};
use crate::messages::{
    unpack_str, AmountRecord, DeniedRecord, HighestRecord, Message, MessageType, NewItemRecord,
    NotSoldRecord, OfferConfRecord, OfferRecord, RegisterRecord, RequestRecord, SettleRecord,
};

/// Decodes one packet.
pub fn decode(data: &[u8]) -> CodecResult<Message> {
    let tag = *data
        .first()
        .ok_or(CodecError::message_too_small(1, 0, "type tag"))?;
    let kind = MessageType::from_u8(tag).ok_or(CodecError::UnknownTag { tag })?;
    let record = &data[1..];

    match kind {
        MessageType::Register => {
            let r: RegisterRecord = read(record, "register record")?;
            Ok(Message::Register {
                req_num: r.req_num,
                name: unpack_str(&r.name),
                ip: unpack_str(&r.ip),
                port: unpack_str(&r.port),
            })
        }
        MessageType::Registered => {
            let r: RegisterRecord = read(record, "registered record")?;
            Ok(Message::Registered {
                req_num: r.req_num,
                name: unpack_str(&r.name),
                ip: unpack_str(&r.ip),
                port: unpack_str(&r.port),
            })
        }
        MessageType::Unregistered => {
            let r: DeniedRecord = read(record, "unregistered record")?;
            Ok(Message::Unregistered {
                req_num: r.req_num,
                reason: unpack_str(&r.reason),
            })
        }
        MessageType::Deregister => {
            let r: RequestRecord = read(record, "deregister record")?;
            Ok(Message::Deregister { req_num: r.req_num })
        }
        MessageType::DeregConf => {
            let r: RequestRecord = read(record, "dereg-conf record")?;
            Ok(Message::DeregConf { req_num: r.req_num })
        }
        MessageType::DeregDenied => {
            let r: DeniedRecord = read(record, "dereg-denied record")?;
            Ok(Message::DeregDenied {
                req_num: r.req_num,
                reason: unpack_str(&r.reason),
            })
        }
        MessageType::Offer => {
            let r: OfferRecord = read(record, "offer record")?;
            Ok(Message::Offer {
                req_num: r.req_num,
                minimum: r.minimum,
                description: unpack_str(&r.description),
            })
        }
        MessageType::OfferConf => {
            let r: OfferConfRecord = read(record, "offer-conf record")?;
            Ok(Message::OfferConf {
                req_num: r.req_num,
                item_id: r.item_id,
                minimum: r.minimum,
                description: unpack_str(&r.description),
            })
        }
        MessageType::OfferDenied => {
            let r: DeniedRecord = read(record, "offer-denied record")?;
            Ok(Message::OfferDenied {
                req_num: r.req_num,
                reason: unpack_str(&r.reason),
            })
        }
        MessageType::Bid => {
            let r: AmountRecord = read(record, "bid record")?;
            Ok(Message::Bid {
                item_id: r.item_id,
                amount: r.amount,
            })
        }
        MessageType::NewItem => {
            let r: NewItemRecord = read(record, "new-item record")?;
            Ok(Message::NewItem {
                item_id: r.item_id,
                minimum: r.minimum,
                description: unpack_str(&r.description),
            })
        }
        MessageType::Highest => {
            let r: HighestRecord = read(record, "highest record")?;
            Ok(Message::Highest {
                item_id: r.item_id,
                amount: r.amount,
                description: unpack_str(&r.description),
            })
        }
        MessageType::BidOver => {
            let r: AmountRecord = read(record, "bid-over record")?;
            Ok(Message::BidOver {
                item_id: r.item_id,
                amount: r.amount,
            })
        }
        MessageType::Win => {
            let r: SettleRecord = read(record, "win record")?;
            Ok(Message::Win {
                item_id: r.item_id,
                amount: r.amount,
                name: unpack_str(&r.name),
                ip: unpack_str(&r.ip),
            })
        }
        MessageType::SoldTo => {
            let r: SettleRecord = read(record, "sold-to record")?;
            Ok(Message::SoldTo {
                item_id: r.item_id,
                amount: r.amount,
                name: unpack_str(&r.name),
                ip: unpack_str(&r.ip),
            })
        }
        MessageType::NotSold => {
            let r: NotSoldRecord = read(record, "not-sold record")?;
            Ok(Message::NotSold {
                item_id: r.item_id,
                reason: unpack_str(&r.reason),
            })
        }
    }
}

fn read<R: FromBytes>(data: &[u8], context: &'static str) -> CodecResult<R> {
    R::read_from_prefix(data)
        .ok_or_else(|| CodecError::message_too_small(size_of::<R>(), data.len(), context))
}
