//! Integration tests for the scan driver: universe filtering, worker pool,
//! failure isolation and deterministic ranking.

use chrono::{Duration, TimeZone, Utc};
use coinscout_core::domain::{Bar, Market, MarketCap, MarketType, SignalClass, Timeframe};
use coinscout_runner::{
    FailureStage, InMemoryProvider, MarketCatalog, ScanConfig, Scanner, SyntheticProvider,
};

// ── Helpers ───────────────────────────

fn bars_from_closes(closes: &[f64], step: Duration, volume: f64) -> Vec<Bar> {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                timestamp: base + step * i as i32,
                open,
                high: open.max(close) * 1.002,
                low: open.min(close) * 0.998,
                close,
                volume,
            }
        })
        .collect()
}

fn geometric(n: usize, start: f64, growth: f64) -> Vec<f64> {
    (0..n).map(|i| start * growth.powi(i as i32)).collect()
}

fn uptrend() -> Vec<Bar> {
    bars_from_closes(&geometric(300, 100.0, 1.005), Timeframe::H6.duration(), 1000.0)
}

fn swap_catalog(entries: &[(&str, u32)]) -> MarketCatalog {
    MarketCatalog::new(
        entries
            .iter()
            .map(|(base, _)| {
                Market::new(&format!("{base}/USDT:USDT"), base, "USDT", MarketType::Swap)
            })
            .collect(),
        entries
            .iter()
            .map(|(base, rank)| MarketCap {
                symbol: base.to_string(),
                name: String::new(),
                rank: *rank,
            })
            .collect(),
    )
}

fn config(workers: usize) -> ScanConfig {
    let mut config = ScanConfig::default();
    config.scan.timeframes = vec![Timeframe::H6];
    config.scan.workers = workers;
    config
}

/// Three identical uptrends, one downtrend, one missing, one zero-volume.
fn mixed_market() -> (MarketCatalog, InMemoryProvider) {
    let catalog = swap_catalog(&[
        ("CCC", 3),
        ("AAA", 1),
        ("BBB", 2),
        ("DOWN", 4),
        ("GONE", 5),
        ("DEAD", 6),
    ]);
    let h6 = Timeframe::H6;
    let down = bars_from_closes(&geometric(300, 500.0, 0.995), h6.duration(), 1000.0);
    let mut dead = uptrend();
    dead[150].volume = 0.0;

    let provider = InMemoryProvider::new()
        .with_series("AAA/USDT:USDT", h6, uptrend())
        .with_series("BBB/USDT:USDT", h6, uptrend())
        .with_series("CCC/USDT:USDT", h6, uptrend())
        .with_series("DOWN/USDT:USDT", h6, down)
        .with_series("DEAD/USDT:USDT", h6, dead);
    (catalog, provider)
}

// ── 1. Ranking ──────────────────────────

#[test]
fn signals_are_ranked_with_failures_isolated() {
    let (catalog, provider) = mixed_market();
    let scanner = Scanner::new(config(1)).unwrap();
    let report = scanner.scan(&catalog, &provider);

    assert_eq!(report.universe_size, 6);
    assert_eq!(report.venue, MarketType::Swap);

    let symbols: Vec<&str> = report.signals.iter().map(|r| r.entry.symbol.as_str()).collect();
    // Equal scores fall back to symbol order.
    assert_eq!(symbols, vec!["AAA/USDT:USDT", "BBB/USDT:USDT", "CCC/USDT:USDT"]);
    for (i, ranked) in report.signals.iter().enumerate() {
        assert_eq!(ranked.rank, i + 1);
        assert_eq!(ranked.entry.signal, SignalClass::Long);
        assert!((ranked.score - ranked.entry.composite_score()).abs() < 1e-12);
        assert!(ranked.entry.leverage.is_some());
    }

    assert_eq!(report.no_signal, 1);
    assert_eq!(report.failures.len(), 2);
    let gone = report.failures.iter().find(|f| f.symbol == "GONE/USDT:USDT").unwrap();
    assert_eq!(gone.stage, FailureStage::Fetch);
    let dead = report.failures.iter().find(|f| f.symbol == "DEAD/USDT:USDT").unwrap();
    assert_eq!(dead.stage, FailureStage::Data);
}

#[test]
fn market_cap_rank_reaches_the_leverage_model() {
    let (catalog, provider) = mixed_market();
    let report = Scanner::new(config(1)).unwrap().scan(&catalog, &provider);
    let aaa = &report.signals[0].entry;
    assert_eq!(aaa.leverage.as_ref().unwrap().market_cap_rank, Some(1));
}

#[test]
fn top_n_truncates_but_percentiles_cover_all_signals() {
    let (catalog, provider) = mixed_market();
    let mut cfg = config(1);
    cfg.scan.top_n = 2;
    let report = Scanner::new(cfg).unwrap().scan(&catalog, &provider);
    assert_eq!(report.signals.len(), 2);
    // Three tied scores share the middle percentile.
    for ranked in &report.signals {
        assert!((ranked.percentile - 0.5).abs() < 1e-12);
    }
}

#[test]
fn zero_volume_is_accepted_when_rejection_is_off() {
    let (catalog, provider) = mixed_market();
    let mut cfg = config(1);
    cfg.scan.reject_zero_volume = false;
    let report = Scanner::new(cfg).unwrap().scan(&catalog, &provider);
    assert!(report
        .failures
        .iter()
        .all(|f| f.symbol != "DEAD/USDT:USDT" || f.stage != FailureStage::Data));
}

// ── 2. Determinism ─────────────────────────

#[test]
fn parallel_and_sequential_scans_agree() {
    let (catalog, provider) = mixed_market();
    let serial = Scanner::new(config(1)).unwrap().scan(&catalog, &provider);
    let parallel = Scanner::new(config(4)).unwrap().scan(&catalog, &provider);

    assert_eq!(serial.signals, parallel.signals);
    assert_eq!(serial.no_signal, parallel.no_signal);
    assert_eq!(serial.config_hash, Scanner::new(config(1)).unwrap().config_hash());

    let mut a: Vec<_> = serial.failures.iter().map(|f| f.symbol.clone()).collect();
    let mut b: Vec<_> = parallel.failures.iter().map(|f| f.symbol.clone()).collect();
    a.sort();
    b.sort();
    assert_eq!(a, b);
}

#[test]
fn synthetic_scan_accounts_for_every_symbol() {
    let catalog = swap_catalog(&[("BTC", 1), ("ETH", 2), ("SOL", 5), ("DOGE", 9), ("USDC", 6)]);
    let mut cfg = ScanConfig::default();
    cfg.scan.workers = 2;
    let report = Scanner::new(cfg).unwrap().scan(&catalog, &SyntheticProvider::default());

    // USDC is a stablecoin and never enters the universe.
    assert_eq!(report.universe_size, 4);
    assert_eq!(
        report.signals.len() + report.no_signal + report.failures.len(),
        report.universe_size
    );
    assert_eq!(report.timeframes, vec![Timeframe::H6, Timeframe::D1]);
}

// ── 3. Spot venue ─────────────────────────

#[test]
fn spot_scan_only_sees_spot_markets() {
    let mut catalog = swap_catalog(&[("AAA", 1)]);
    catalog
        .markets
        .push(Market::new("AAA/USDT", "AAA", "USDT", MarketType::Spot));
    let provider = InMemoryProvider::new().with_series("AAA/USDT", Timeframe::H6, uptrend());

    let mut cfg = config(1);
    cfg.scan.venue = MarketType::Spot;
    let report = Scanner::new(cfg).unwrap().scan(&catalog, &provider);

    assert_eq!(report.universe_size, 1);
    assert_eq!(report.signals.len(), 1);
    let r = &report.signals[0].entry;
    assert_eq!(r.symbol, "AAA/USDT");
    assert_eq!(r.signal, SignalClass::Buy);
    assert!(r.leverage.is_none());
}

// ── 4. Grid scan ─────────────────────────

#[test]
fn grid_scan_ranks_oscillating_market_first() {
    let sine: Vec<f64> = (0..250)
        .map(|i| 100.0 * (1.0 + 0.02 * (2.0 * std::f64::consts::PI * i as f64 / 20.0).sin()))
        .collect();
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let osc: Vec<Bar> = sine
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { sine[i - 1] };
            Bar {
                timestamp: base + Duration::days(i as i64),
                open,
                high: open.max(close) * 1.01,
                low: open.min(close) * 0.99,
                close,
                volume: 1000.0 + (i % 7) as f64 * 50.0,
            }
        })
        .collect();

    let catalog = swap_catalog(&[("OSC", 300), ("SHORT", 10), ("FAR", 900)]);
    let provider = InMemoryProvider::new()
        .with_series("OSC/USDT:USDT", Timeframe::D1, osc.clone())
        .with_series("SHORT/USDT:USDT", Timeframe::D1, osc[..30].to_vec())
        .with_series("FAR/USDT:USDT", Timeframe::D1, osc);

    let report = Scanner::new(config(2)).unwrap().scan_grid(&catalog, &provider);

    // Rank 900 is outside the default grid rank cap of 500.
    assert_eq!(report.universe_size, 2);
    assert_eq!(report.timeframe, Timeframe::D1);
    assert_eq!(report.opportunities.len(), 1);
    assert_eq!(report.opportunities[0].entry.symbol, "OSC/USDT:USDT");
    assert_eq!(report.suitable, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].stage, FailureStage::Analysis);
}
