// src/parser.rs
//! Parser for the upstream gateway's `|`-delimited text feed.
//!
//! One record per line:
//! - `TRADE|ts_ms|SYMBOL|SIDE|price|qty`
//! - `DEPTH|ts_ms|SYMBOL|bid_list|ask_list` (`price:qty` pairs, comma-separated)
//! - `LIQ|ts_ms|SYMBOL|side|price|qty`
//! - `TICKER|ts_ms|SYMBOL|open_interest|funding_rate|mark_price`
//!
//! Lines that don't parse are dropped, never fatal: unknown record types,
//! unknown symbols, missing fields, unparsable numbers.

use crate::fixed;
use crate::wire::{
    DepthSnapshot, LiqPayload, MarketMsg, TickerPayload, TradePayload, DEPTH_LEVELS,
};

pub struct FeedParser {
    symbol: String,
    skip_depth: bool,
}

impl FeedParser {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            skip_depth: false,
        }
    }

    /// Drop DEPTH records at parse time. The heatmap consumer never looks at
    /// depth and those lines dominate feed volume.
    pub fn skip_depth(mut self, skip: bool) -> Self {
        self.skip_depth = skip;
        self
    }

    /// Parses one feed line. `None` means the line is dropped.
    pub fn parse_line(&self, line: &str) -> Option<MarketMsg> {
        let mut parts = line.split('|');
        let tag = parts.next()?;

        match tag {
            "TRADE" => {
                let ts_ms = parts.next()?.parse::<i64>().ok()?;
                self.check_symbol(parts.next()?)?;
                let buyer_maker = match parts.next()? {
                    "BUY" => false,
                    "SELL" => true,
                    _ => return None,
                };
                let price = fixed::to_e8(parts.next()?)?;
                let qty = fixed::to_e8(parts.next()?)?;
                Some(MarketMsg::Trade(TradePayload {
                    ts_ms,
                    price,
                    qty,
                    buyer_maker,
                }))
            }
            "DEPTH" => {
                if self.skip_depth {
                    return None;
                }
                let ts_ms = parts.next()?.parse::<i64>().ok()?;
                self.check_symbol(parts.next()?)?;
                let bids = parts.next()?;
                let asks = parts.next()?;

                let mut snap = Box::new(DepthSnapshot {
                    ts_ms,
                    ..Default::default()
                });
                parse_levels(bids, &mut snap.bid_px, &mut snap.bid_qty);
                parse_levels(asks, &mut snap.ask_px, &mut snap.ask_qty);
                Some(MarketMsg::Depth(snap))
            }
            "LIQ" => {
                let ts_ms = parts.next()?.parse::<i64>().ok()?;
                self.check_symbol(parts.next()?)?;
                let side = *parts.next()?.as_bytes().first()?;
                let price = fixed::to_e8(parts.next()?)?;
                let qty = fixed::to_e8(parts.next()?)?;
                Some(MarketMsg::Liq(LiqPayload {
                    ts_ms,
                    price,
                    qty,
                    side,
                }))
            }
            "TICKER" => {
                let ts_ms = parts.next()?.parse::<i64>().ok()?;
                self.check_symbol(parts.next()?)?;
                let open_interest = fixed::to_e8(parts.next()?)?;
                let funding_rate = fixed::to_e8(parts.next()?)?;
                let mark_price = fixed::to_e8(parts.next()?)?;
                Some(MarketMsg::Ticker(TickerPayload {
                    ts_ms,
                    open_interest,
                    funding_rate,
                    mark_price,
                }))
            }
            _ => None,
        }
    }

    fn check_symbol(&self, sym: &str) -> Option<()> {
        (sym == self.symbol).then_some(())
    }
}

/// Parses up to 50 `price:qty` pairs into the fixed slot arrays. Malformed
/// pairs are skipped; levels past the 50th are ignored; remaining slots stay
/// zero.
fn parse_levels(list: &str, px: &mut [i64; DEPTH_LEVELS], qty: &mut [i64; DEPTH_LEVELS]) {
    let mut i = 0;
    for pair in list.split(',') {
        if i == DEPTH_LEVELS {
            break;
        }
        let Some((p, q)) = pair.split_once(':') else {
            continue;
        };
        let (Some(p), Some(q)) = (fixed::to_e8(p), fixed::to_e8(q)) else {
            continue;
        };
        px[i] = p;
        qty[i] = q;
        i += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> FeedParser {
        FeedParser::new("WLDUSDT")
    }

    #[test]
    fn parses_trade() {
        let msg = parser()
            .parse_line("TRADE|1700000000123|WLDUSDT|SELL|2.0000|1.5")
            .unwrap();
        match msg {
            MarketMsg::Trade(t) => {
                assert_eq!(t.ts_ms, 1_700_000_000_123);
                assert_eq!(t.price, 200_000_000);
                assert_eq!(t.qty, 150_000_000);
                assert!(t.buyer_maker); // SELL => taker sold
            }
            other => panic!("expected trade, got {other:?}"),
        }
    }

    #[test]
    fn parses_depth_lists() {
        let msg = parser()
            .parse_line("DEPTH|1700000000123|WLDUSDT|2.0:1.0,1.9:2.0|2.01:0.5")
            .unwrap();
        match msg {
            MarketMsg::Depth(d) => {
                assert_eq!(d.bid_px[0], 200_000_000);
                assert_eq!(d.bid_qty[1], 200_000_000);
                assert_eq!(d.bid_px[2], 0); // unused slot
                assert_eq!(d.ask_px[0], 201_000_000);
                assert_eq!(d.ask_qty[0], 50_000_000);
            }
            other => panic!("expected depth, got {other:?}"),
        }
    }

    #[test]
    fn depth_truncates_past_fifty_levels() {
        let levels: Vec<String> = (1..=60).map(|i| format!("{i}.0:1.0")).collect();
        let line = format!("DEPTH|1|WLDUSDT|{}|61.0:1.0", levels.join(","));
        match parser().parse_line(&line).unwrap() {
            MarketMsg::Depth(d) => {
                assert_eq!(d.bid_px[49], 5_000_000_000);
                assert!(d.bid_px.iter().all(|&p| p <= 5_000_000_000));
            }
            other => panic!("expected depth, got {other:?}"),
        }
    }

    #[test]
    fn parses_liq_side_first_byte() {
        let msg = parser()
            .parse_line("LIQ|1700000000123|WLDUSDT|Buy|2.08|0.5")
            .unwrap();
        match msg {
            MarketMsg::Liq(l) => {
                assert_eq!(l.side, b'B');
                assert_eq!(l.price, 208_000_000);
            }
            other => panic!("expected liq, got {other:?}"),
        }
    }

    #[test]
    fn parses_ticker_with_negative_funding() {
        let msg = parser()
            .parse_line("TICKER|1700000000123|WLDUSDT|23232.23|-0.0001|2.0001")
            .unwrap();
        match msg {
            MarketMsg::Ticker(t) => {
                assert_eq!(t.funding_rate, -10_000);
                assert_eq!(t.mark_price, 200_010_000);
            }
            other => panic!("expected ticker, got {other:?}"),
        }
    }

    #[test]
    fn drops_bad_lines() {
        let p = parser();
        assert!(p.parse_line("").is_none());
        assert!(p.parse_line("HELLO|1|WLDUSDT").is_none());
        assert!(p.parse_line("TRADE|1|BTCUSDT|BUY|1.0|1.0").is_none()); // wrong symbol
        assert!(p.parse_line("TRADE|1|WLDUSDT|HOLD|1.0|1.0").is_none()); // bad side
        assert!(p.parse_line("TRADE|1|WLDUSDT|BUY|abc|1.0").is_none()); // bad price
        assert!(p.parse_line("TRADE|1|WLDUSDT|BUY").is_none()); // short line
        assert!(p.parse_line("TICKER|x|WLDUSDT|1|1|1").is_none()); // bad ts
    }

    #[test]
    fn skip_depth_filters_depth_only() {
        let p = FeedParser::new("WLDUSDT").skip_depth(true);
        assert!(p.parse_line("DEPTH|1|WLDUSDT|2.0:1.0|2.01:1.0").is_none());
        assert!(p.parse_line("TRADE|1|WLDUSDT|BUY|2.0|1.0").is_some());
    }

    #[test]
    fn malformed_depth_pairs_are_skipped() {
        match parser()
            .parse_line("DEPTH|1|WLDUSDT|2.0:1.0,junk,1.9:1.0|2.01:1.0")
            .unwrap()
        {
            MarketMsg::Depth(d) => {
                assert_eq!(d.bid_px[0], 200_000_000);
                assert_eq!(d.bid_px[1], 190_000_000);
                assert_eq!(d.bid_px[2], 0);
            }
            other => panic!("expected depth, got {other:?}"),
        }
    }
}
