//! Report export: JSON, CSV, and Markdown.
//!
//! - **JSON**: full round-trip serialization with schema versioning
//! - **CSV**: one row per ranked symbol for spreadsheets
//! - **Markdown**: human-readable ranking tables
//!
//! Persisted reports carry `schema_version`; newer versions are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::scan::{GridReport, ScanReport, SCHEMA_VERSION};

// ─── JSON ───────────────────────────

pub fn export_json(report: &ScanReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize ScanReport to JSON")
}

pub fn import_json(json: &str) -> Result<ScanReport> {
    let report: ScanReport =
        serde_json::from_str(json).context("failed to deserialize ScanReport from JSON")?;
    check_schema(report.schema_version)?;
    Ok(report)
}

pub fn export_grid_json(report: &GridReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize GridReport to JSON")
}

pub fn import_grid_json(json: &str) -> Result<GridReport> {
    let report: GridReport =
        serde_json::from_str(json).context("failed to deserialize GridReport from JSON")?;
    check_schema(report.schema_version)?;
    Ok(report)
}

fn check_schema(version: u32) -> Result<()> {
    if version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            version,
            SCHEMA_VERSION
        );
    }
    Ok(())
}

// ─── CSV ───────────────────────────

/// Columns: rank, symbol, market_type, signal, confidence, threshold,
/// expected_return, score, percentile, entry, stop_loss, take_profit, atr,
/// leverage, risk_tier, primary_timeframe, as_of
pub fn export_signals_csv(report: &ScanReport) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "rank",
        "symbol",
        "market_type",
        "signal",
        "confidence",
        "threshold",
        "expected_return",
        "score",
        "percentile",
        "entry",
        "stop_loss",
        "take_profit",
        "atr",
        "leverage",
        "risk_tier",
        "primary_timeframe",
        "as_of",
    ])?;

    for ranked in &report.signals {
        let r = &ranked.entry;
        let (leverage, tier) = match &r.leverage {
            Some(l) => (format!("{:.1}", l.suggested_leverage), l.risk_tier.as_str().to_string()),
            None => (String::new(), String::new()),
        };
        wtr.write_record([
            &ranked.rank.to_string(),
            &r.symbol,
            &r.market_type.to_string(),
            &format!("{:?}", r.signal).to_lowercase(),
            &format!("{:.4}", r.confidence),
            &format!("{:.2}", r.threshold),
            &format!("{:.4}", r.expected_return),
            &format!("{:.4}", ranked.score),
            &format!("{:.3}", ranked.percentile),
            &format!("{:.8}", r.entry_price),
            &format!("{:.8}", r.stop_loss),
            &format!("{:.8}", r.take_profit),
            &format!("{:.8}", r.atr),
            &leverage,
            &tier,
            r.primary_timeframe.as_str(),
            &r.as_of.to_rfc3339(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Columns: rank, symbol, composite_score, volatility_score, trend_score,
/// volume_score, suitable, price, lower_price, upper_price, grid_count,
/// grid_step, efficiency_ratio, trend_strength, as_of
pub fn export_grid_csv(report: &GridReport) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "rank",
        "symbol",
        "composite_score",
        "volatility_score",
        "trend_score",
        "volume_score",
        "suitable",
        "price",
        "lower_price",
        "upper_price",
        "grid_count",
        "grid_step",
        "efficiency_ratio",
        "trend_strength",
        "as_of",
    ])?;

    for ranked in &report.opportunities {
        let g = &ranked.entry;
        wtr.write_record([
            &ranked.rank.to_string(),
            &g.symbol,
            &format!("{:.4}", g.composite_score),
            &format!("{:.4}", g.volatility_score),
            &format!("{:.4}", g.trend_score),
            &format!("{:.4}", g.volume_score),
            &g.is_suitable().to_string(),
            &format!("{:.8}", g.price),
            &format!("{:.8}", g.lower_price),
            &format!("{:.8}", g.upper_price),
            &g.grid_count.to_string(),
            &format!("{:.8}", g.grid_step()),
            &format!("{:.4}", g.efficiency_ratio),
            &format!("{:.4}", g.trend_strength),
            &g.as_of.to_rfc3339(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ───────────────────────

/// Write `report.json`, `signals.csv` and `report.md` into
/// `{output_dir}/scan_{venue}_{timestamp}/`. Returns the created directory.
pub fn save_artifacts(report: &ScanReport, output_dir: &Path) -> Result<PathBuf> {
    let dirname = format!(
        "scan_{}_{}",
        report.venue,
        report.generated_at.format("%Y%m%d_%H%M%S")
    );
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("report.json"), export_json(report)?)?;
    std::fs::write(run_dir.join("signals.csv"), export_signals_csv(report)?)?;
    std::fs::write(run_dir.join("report.md"), generate_report(report))?;

    Ok(run_dir)
}

/// Load a `ScanReport` from an artifact directory. Rejects unknown schema versions.
pub fn load_artifacts(dir: &Path) -> Result<ScanReport> {
    let path = dir.join("report.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

// ─── Markdown ──────────────────────────

pub fn generate_report(report: &ScanReport) -> String {
    let mut md = String::with_capacity(2048);

    md.push_str(&format!("# {} Scan\n\n", title_case(&report.venue.to_string())));
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Generated | {} |\n", report.generated_at.format("%Y-%m-%d %H:%M UTC")));
    let tfs: Vec<&str> = report.timeframes.iter().map(|t| t.as_str()).collect();
    md.push_str(&format!("| Timeframes | {} |\n", tfs.join(", ")));
    md.push_str(&format!("| Provider | {} |\n", report.provider));
    md.push_str(&format!("| Universe | {} |\n", report.universe_size));
    md.push_str(&format!("| Below threshold | {} |\n", report.no_signal));
    md.push_str(&format!("| Failures | {} |\n", report.failures.len()));
    md.push_str(&format!("| Config | `{}` |\n\n", short_hash(&report.config_hash)));

    if report.signals.is_empty() {
        md.push_str("No symbol cleared the confidence threshold.\n");
    } else {
        md.push_str(concat!(
            "| # | Symbol | Confidence | Exp. Return | Score ",
            "| Entry | Stop | Target | Leverage |\n",
        ));
        md.push_str("| ---: | --- | ---: | ---: | ---: | ---: | ---: | ---: | --- |\n");
        for ranked in &report.signals {
            let r = &ranked.entry;
            let leverage = r
                .leverage
                .as_ref()
                .map(|l| format!("{:.1}x ({})", l.suggested_leverage, l.risk_tier.as_str()))
                .unwrap_or_else(|| "-".to_string());
            md.push_str(&format!(
                "| {} | {} | {:.1}% | {:.2} | {:.3} | {} | {} | {} | {} |\n",
                ranked.rank,
                r.symbol,
                r.confidence * 100.0,
                r.expected_return,
                ranked.score,
                price(r.entry_price),
                price(r.stop_loss),
                price(r.take_profit),
                leverage,
            ));
        }
    }

    append_failures(&mut md, &report.failures);
    md
}

pub fn generate_grid_report(report: &GridReport) -> String {
    let mut md = String::with_capacity(2048);

    md.push_str("# Grid Suitability\n\n");
    md.push_str(&format!(
        "{} of {} markets on {} are grid-suitable.\n\n",
        report.suitable, report.universe_size, report.timeframe
    ));

    if !report.opportunities.is_empty() {
        md.push_str("| # | Symbol | Score | Vol | Trend | Volume | Lower | Upper | Grids |\n");
        md.push_str("| ---: | --- | ---: | ---: | ---: | ---: | ---: | ---: | ---: |\n");
        for ranked in &report.opportunities {
            let g = &ranked.entry;
            md.push_str(&format!(
                "| {} | {} | {:.3}{} | {:.2} | {:.2} | {:.2} | {} | {} | {} |\n",
                ranked.rank,
                g.symbol,
                g.composite_score,
                if g.is_suitable() { "" } else { " *" },
                g.volatility_score,
                g.trend_score,
                g.volume_score,
                price(g.lower_price),
                price(g.upper_price),
                g.grid_count,
            ));
        }
        md.push_str("\n`*` below the suitability threshold.\n");
    }

    append_failures(&mut md, &report.failures);
    md
}

fn append_failures(md: &mut String, failures: &[crate::scan::ScanFailure]) {
    if failures.is_empty() {
        return;
    }
    md.push_str("\n## Skipped\n\n");
    for f in failures {
        md.push_str(&format!("- {} ({:?}): {}\n", f.symbol, f.stage, f.reason));
    }
}

/// Significant digits scale with magnitude so sub-cent coins stay readable.
fn price(v: f64) -> String {
    if v >= 100.0 {
        format!("{v:.2}")
    } else if v >= 1.0 {
        format!("{v:.4}")
    } else {
        format!("{v:.8}")
    }
}

fn short_hash(hash: &str) -> &str {
    &hash[..hash.len().min(12)]
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
