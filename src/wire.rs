// src/wire.rs
//! Binary wire protocol for captured market events.
//!
//! Each record is a one-byte type tag, a one-byte symbol id, then the packed
//! little-endian payload for that type. No padding, no alignment; the
//! cache-line-aligned in-memory form lives in [`crate::book::MarketUpdate`],
//! not on the wire.

use bytes::BufMut;

pub const TYPE_TRADE: u8 = 0x01;
pub const TYPE_DEPTH_SNAPSHOT: u8 = 0x03;
pub const TYPE_LIQ: u8 = 0x04;
pub const TYPE_TICKER: u8 = 0x05;

/// The single configured symbol.
pub const SYMBOL_ID: u8 = 0;

/// Depth levels carried per side in a snapshot packet.
pub const DEPTH_LEVELS: usize = 50;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TradePayload {
    pub ts_ms: i64,
    pub price: i64,
    pub qty: i64,
    /// true => the buyer was the maker, i.e. the taker sold.
    pub buyer_maker: bool,
}

/// Full top-50 snapshot. Unused slots are zeros.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DepthSnapshot {
    pub ts_ms: i64,
    pub bid_px: [i64; DEPTH_LEVELS],
    pub bid_qty: [i64; DEPTH_LEVELS],
    pub ask_px: [i64; DEPTH_LEVELS],
    pub ask_qty: [i64; DEPTH_LEVELS],
}

impl Default for DepthSnapshot {
    fn default() -> Self {
        Self {
            ts_ms: 0,
            bid_px: [0; DEPTH_LEVELS],
            bid_qty: [0; DEPTH_LEVELS],
            ask_px: [0; DEPTH_LEVELS],
            ask_qty: [0; DEPTH_LEVELS],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LiqPayload {
    pub ts_ms: i64,
    pub price: i64,
    pub qty: i64,
    /// First byte of the liquidation-order side word ('B' or 'S').
    pub side: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickerPayload {
    pub ts_ms: i64,
    pub open_interest: i64,
    pub funding_rate: i64,
    pub mark_price: i64,
}

/// A typed market event as carried through the ring.
///
/// Tagged sum type; the depth snapshot is boxed so the enum stays small and
/// ring slots cheap to move.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MarketMsg {
    Trade(TradePayload),
    Depth(Box<DepthSnapshot>),
    Liq(LiqPayload),
    Ticker(TickerPayload),
}

impl MarketMsg {
    pub fn type_tag(&self) -> u8 {
        match self {
            MarketMsg::Trade(_) => TYPE_TRADE,
            MarketMsg::Depth(_) => TYPE_DEPTH_SNAPSHOT,
            MarketMsg::Liq(_) => TYPE_LIQ,
            MarketMsg::Ticker(_) => TYPE_TICKER,
        }
    }

    /// Exchange timestamp (ms) of the event.
    pub fn ts_ms(&self) -> i64 {
        match self {
            MarketMsg::Trade(t) => t.ts_ms,
            MarketMsg::Depth(d) => d.ts_ms,
            MarketMsg::Liq(l) => l.ts_ms,
            MarketMsg::Ticker(t) => t.ts_ms,
        }
    }
}

#[inline(always)]
fn put_levels(out: &mut Vec<u8>, levels: &[i64; DEPTH_LEVELS]) {
    for v in levels {
        out.put_i64_le(*v);
    }
}

/// Appends the packed record (tag, symbol id, payload) to `out`.
pub fn encode_msg(msg: &MarketMsg, out: &mut Vec<u8>) {
    out.put_u8(msg.type_tag());
    out.put_u8(SYMBOL_ID);

    match msg {
        MarketMsg::Trade(t) => {
            out.put_i64_le(t.ts_ms);
            out.put_i64_le(t.price);
            out.put_i64_le(t.qty);
            out.put_u8(t.buyer_maker as u8);
        }
        MarketMsg::Depth(d) => {
            out.put_i64_le(d.ts_ms);
            put_levels(out, &d.bid_px);
            put_levels(out, &d.bid_qty);
            put_levels(out, &d.ask_px);
            put_levels(out, &d.ask_qty);
        }
        MarketMsg::Liq(l) => {
            out.put_i64_le(l.ts_ms);
            out.put_i64_le(l.price);
            out.put_i64_le(l.qty);
            out.put_u8(l.side);
        }
        MarketMsg::Ticker(t) => {
            out.put_i64_le(t.ts_ms);
            out.put_i64_le(t.open_interest);
            out.put_i64_le(t.funding_rate);
            out.put_i64_le(t.mark_price);
        }
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn u8(&mut self) -> Option<u8> {
        let v = *self.buf.get(self.pos)?;
        self.pos += 1;
        Some(v)
    }

    fn i64(&mut self) -> Option<i64> {
        let bytes = self.buf.get(self.pos..self.pos + 8)?;
        self.pos += 8;
        Some(i64::from_le_bytes(bytes.try_into().ok()?))
    }

    fn levels(&mut self) -> Option<[i64; DEPTH_LEVELS]> {
        let mut out = [0i64; DEPTH_LEVELS];
        for slot in &mut out {
            *slot = self.i64()?;
        }
        Some(out)
    }
}

/// Decodes one record from the front of `buf`.
///
/// Returns the message and the number of bytes consumed, or `None` on a
/// truncated buffer or unknown tag. Inverse of [`encode_msg`]; used by
/// offline log inspection and tests.
pub fn decode_msg(buf: &[u8]) -> Option<(MarketMsg, usize)> {
    let mut r = Reader { buf, pos: 0 };
    let tag = r.u8()?;
    let _symbol = r.u8()?;

    let msg = match tag {
        TYPE_TRADE => MarketMsg::Trade(TradePayload {
            ts_ms: r.i64()?,
            price: r.i64()?,
            qty: r.i64()?,
            buyer_maker: r.u8()? != 0,
        }),
        TYPE_DEPTH_SNAPSHOT => {
            let ts_ms = r.i64()?;
            MarketMsg::Depth(Box::new(DepthSnapshot {
                ts_ms,
                bid_px: r.levels()?,
                bid_qty: r.levels()?,
                ask_px: r.levels()?,
                ask_qty: r.levels()?,
            }))
        }
        TYPE_LIQ => MarketMsg::Liq(LiqPayload {
            ts_ms: r.i64()?,
            price: r.i64()?,
            qty: r.i64()?,
            side: r.u8()?,
        }),
        TYPE_TICKER => MarketMsg::Ticker(TickerPayload {
            ts_ms: r.i64()?,
            open_interest: r.i64()?,
            funding_rate: r.i64()?,
            mark_price: r.i64()?,
        }),
        _ => return None,
    };

    Some((msg, r.pos))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trade_record_layout() {
        let msg = MarketMsg::Trade(TradePayload {
            ts_ms: 1_700_000_000_000,
            price: 208_000_000,
            qty: 100_000_000,
            buyer_maker: true,
        });
        let mut buf = Vec::new();
        encode_msg(&msg, &mut buf);

        // tag + symbol + 3 x i64 + flag
        assert_eq!(buf.len(), 2 + 24 + 1);
        assert_eq!(buf[0], TYPE_TRADE);
        assert_eq!(buf[1], SYMBOL_ID);
        assert_eq!(buf[buf.len() - 1], 1);
    }

    #[test]
    fn depth_record_is_fixed_size() {
        let msg = MarketMsg::Depth(Box::default());
        let mut buf = Vec::new();
        encode_msg(&msg, &mut buf);
        assert_eq!(buf.len(), 2 + 8 + 4 * DEPTH_LEVELS * 8);
    }

    #[test]
    fn decode_inverts_encode() {
        let mut snap = DepthSnapshot {
            ts_ms: 42,
            ..Default::default()
        };
        snap.bid_px[0] = 50_000_000;
        snap.bid_qty[0] = 1_000_000_000;
        snap.ask_px[0] = 50_020_000;
        snap.ask_qty[0] = 2_000_000_000;

        let msgs = [
            MarketMsg::Trade(TradePayload {
                ts_ms: 1,
                price: 2,
                qty: 3,
                buyer_maker: false,
            }),
            MarketMsg::Depth(Box::new(snap)),
            MarketMsg::Liq(LiqPayload {
                ts_ms: 9,
                price: 208_000_000,
                qty: 50_000_000,
                side: b'B',
            }),
            MarketMsg::Ticker(TickerPayload {
                ts_ms: 7,
                open_interest: 11,
                funding_rate: -10_000,
                mark_price: 200_000_000,
            }),
        ];

        let mut buf = Vec::new();
        for m in &msgs {
            encode_msg(m, &mut buf);
        }

        let mut pos = 0;
        for expected in &msgs {
            let (got, used) = decode_msg(&buf[pos..]).unwrap();
            assert_eq!(&got, expected);
            pos += used;
        }
        assert_eq!(pos, buf.len());
    }

    #[test]
    fn decode_rejects_truncated_and_unknown() {
        let msg = MarketMsg::Ticker(TickerPayload {
            ts_ms: 1,
            open_interest: 2,
            funding_rate: 3,
            mark_price: 4,
        });
        let mut buf = Vec::new();
        encode_msg(&msg, &mut buf);

        assert!(decode_msg(&buf[..buf.len() - 1]).is_none());
        buf[0] = 0x7f;
        assert!(decode_msg(&buf).is_none());
    }
}
