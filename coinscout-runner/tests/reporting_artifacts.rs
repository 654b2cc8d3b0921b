//! Export round-trips, artifact bundles, config files and the CSV provider.

use chrono::{Duration, TimeZone, Utc};
use coinscout_core::domain::{Bar, Market, MarketCap, MarketType, Timeframe};
use coinscout_runner::export::{
    export_grid_csv, export_grid_json, export_json, export_signals_csv, generate_report,
    import_grid_json, import_json, load_artifacts, save_artifacts,
};
use coinscout_runner::{
    CsvProvider, MarketCatalog, OhlcvProvider, ProviderError, ScanConfig, ScanReport, Scanner,
    SyntheticProvider,
};

fn uptrend_bars(n: usize) -> Vec<Bar> {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    (0..n)
        .map(|i| {
            let close = 100.0 * 1.005f64.powi(i as i32);
            let open = if i == 0 { close } else { 100.0 * 1.005f64.powi(i as i32 - 1) };
            Bar {
                timestamp: base + Duration::hours(6 * i as i64),
                open,
                high: close * 1.002,
                low: open * 0.998,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

fn catalog() -> MarketCatalog {
    MarketCatalog::new(
        vec![
            Market::new("BTC/USDT:USDT", "BTC", "USDT", MarketType::Swap),
            Market::new("ETH/USDT:USDT", "ETH", "USDT", MarketType::Swap),
        ],
        vec![
            MarketCap {
                symbol: "BTC".into(),
                name: "Bitcoin".into(),
                rank: 1,
            },
            MarketCap {
                symbol: "ETH".into(),
                name: "Ethereum".into(),
                rank: 2,
            },
        ],
    )
}

/// Scan over a CSV directory holding one uptrend; ETH has no file.
fn csv_scan(dir: &std::path::Path) -> ScanReport {
    let provider = CsvProvider::new(dir);
    provider
        .store("BTC/USDT:USDT", Timeframe::H6, &uptrend_bars(300))
        .unwrap();

    let mut config = ScanConfig::default();
    config.scan.timeframes = vec![Timeframe::H6];
    config.scan.workers = 1;
    Scanner::new(config).unwrap().scan(&catalog(), &provider)
}

// ── 1. CSV provider ────────────────────────

#[test]
fn csv_provider_round_trips_bars() {
    let dir = tempfile::tempdir().unwrap();
    let provider = CsvProvider::new(dir.path());
    let bars = uptrend_bars(120);
    let path = provider.store("SOL/USDT:USDT", Timeframe::H6, &bars).unwrap();
    assert!(path.ends_with("SOL_USDT_USDT_6h.csv"));

    let all = provider.fetch("SOL/USDT:USDT", Timeframe::H6, 500).unwrap();
    assert_eq!(all, bars);
    let tail = provider.fetch("SOL/USDT:USDT", Timeframe::H6, 20).unwrap();
    assert_eq!(tail.as_slice(), &bars[100..]);
}

#[test]
fn csv_provider_reports_missing_and_malformed_files() {
    let dir = tempfile::tempdir().unwrap();
    let provider = CsvProvider::new(dir.path());
    assert!(matches!(
        provider.fetch("NOPE/USDT", Timeframe::D1, 10),
        Err(ProviderError::NotFound { .. })
    ));

    std::fs::write(
        dir.path().join("BAD_USDT_1d.csv"),
        "timestamp,open,high,low,close,volume\n1704067200000,1,2,0.5,abc,10\n",
    )
    .unwrap();
    assert!(matches!(
        provider.fetch("BAD/USDT", Timeframe::D1, 10),
        Err(ProviderError::Malformed { .. })
    ));
}

// ── 2. Signal export ────────────────────────

#[test]
fn scan_over_csv_directory_exports_csv_and_json() {
    let dir = tempfile::tempdir().unwrap();
    let report = csv_scan(dir.path());
    assert_eq!(report.signals.len(), 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.provider, "csv");

    let csv = export_signals_csv(&report).unwrap();
    let mut lines = csv.lines();
    let header = lines.next().unwrap();
    assert!(header.starts_with("rank,symbol,market_type,signal,confidence"));
    let row = lines.next().unwrap();
    assert!(row.starts_with("1,BTC/USDT:USDT,swap,long,"));
    assert!(lines.next().is_none());

    let json = export_json(&report).unwrap();
    let back = import_json(&json).unwrap();
    assert_eq!(back.config_hash, report.config_hash);
    assert_eq!(back.generated_at, report.generated_at);
    assert_eq!(export_signals_csv(&back).unwrap(), csv);
}

#[test]
fn import_rejects_newer_schema() {
    let dir = tempfile::tempdir().unwrap();
    let json = export_json(&csv_scan(dir.path())).unwrap();
    let bumped = json.replacen("\"schema_version\": 1", "\"schema_version\": 99", 1);
    assert_ne!(bumped, json);
    assert!(import_json(&bumped).is_err());
}

#[test]
fn artifacts_bundle_is_written_and_reloaded() {
    let data = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let report = csv_scan(data.path());

    let run_dir = save_artifacts(&report, out.path()).unwrap();
    for file in ["report.json", "signals.csv", "report.md"] {
        assert!(run_dir.join(file).exists(), "missing {file}");
    }
    let loaded = load_artifacts(&run_dir).unwrap();
    assert_eq!(loaded.signals.len(), 1);
    assert_eq!(loaded.venue, MarketType::Swap);

    let md = generate_report(&report);
    assert!(md.starts_with("# Swap Scan"));
    assert!(md.contains("BTC/USDT:USDT"));
    assert!(md.contains("## Skipped"));
}

// ── 3. Grid export ─────────────────────────

#[test]
fn grid_report_exports() {
    let report = Scanner::new(ScanConfig::default())
        .unwrap()
        .scan_grid(&catalog(), &SyntheticProvider::default());
    assert_eq!(report.universe_size, 2);
    assert_eq!(report.opportunities.len() + report.failures.len(), 2);

    let csv = export_grid_csv(&report).unwrap();
    assert_eq!(csv.lines().count(), 1 + report.opportunities.len());
    assert!(csv.starts_with("rank,symbol,composite_score"));

    let back = import_grid_json(&export_grid_json(&report).unwrap()).unwrap();
    assert_eq!(back.opportunities.len(), report.opportunities.len());
}

// ── 4. Config files ────────────────────────

#[test]
fn config_loads_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scan.toml");
    std::fs::write(
        &path,
        r#"
[scan]
venue = "swap"
timeframes = ["4h", "1d"]
top_n = 5

[universe]
max_rank = 100

[grid.params]
window = 40
"#,
    )
    .unwrap();

    let config = ScanConfig::from_file(&path).unwrap();
    assert_eq!(config.scan.timeframes, vec![Timeframe::H4, Timeframe::D1]);
    assert_eq!(config.scan.top_n, 5);
    assert_eq!(config.universe.max_rank, Some(100));
    assert_eq!(config.grid.params.window, 40);
    assert_eq!(config.grid.params.atr_period, 14);

    assert!(ScanConfig::from_file(&dir.path().join("missing.toml")).is_err());
}
