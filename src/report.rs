//! One-shot report mode: fetch once, print descriptive statistics and the
//! commentary to stdout.

use crate::analysis::{self, Tone};
use crate::config::{AppConfig, clamp_days};
use crate::indicators::{self, Describe};
use crate::series;
use crate::session::{Session, ViewParams};
use anyhow::Result;
use chrono::DateTime;
use comfy_table::{
    Attribute, Cell, CellAlignment, ContentArrangement, Table, modifiers::UTF8_ROUND_CORNERS,
    presets::UTF8_BORDERS_ONLY,
};

pub async fn run(config: &AppConfig) -> Result<()> {
    let days = clamp_days(config.days);
    let params = ViewParams {
        coin_id: config.coin_id.clone(),
        currency: config.vs_currency,
        days,
    };

    let mut session = Session::new();
    let (catalog, window) = session.refresh(&params).await;

    let coin_name = match catalog {
        Ok(coins) => coins
            .iter()
            .find(|c| c.id == config.coin_id)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| capitalize(&config.coin_id)),
        Err(e) => {
            eprintln!("Warning: {e}; using the coin id as its name.");
            capitalize(&config.coin_id)
        }
    };

    let window = window?;
    if window.partial {
        println!(
            "Note: requested {days} days but the hourly feed returned fewer points; showing all {} available.",
            window.prices.len()
        );
    }

    let (prices, volumes) = series::align(&window.prices, &window.volumes);
    let table = indicators::compute_indicators(&prices, &volumes);
    anyhow::ensure!(
        !table.is_empty(),
        "no overlapping price/volume observations to analyze"
    );

    let span = match (table.timestamps_ms.first(), table.timestamps_ms.last()) {
        (Some(&first), Some(&last)) => {
            format!("{} .. {}", format_timestamp(first), format_timestamp(last))
        }
        _ => "empty".to_string(),
    };
    println!(
        "\n{} over {} days ({}) — {} points, {} UTC",
        coin_name,
        days,
        config.vs_currency.as_str().to_uppercase(),
        table.len(),
        span
    );

    if let (Some(price_stats), Some(volume_stats)) = (
        indicators::describe(&table.price),
        indicators::describe(&table.volume),
    ) {
        println!("\n{}", stats_table(&price_stats, &volume_stats, config));
    }

    println!("\nAutomated market analysis:");
    for c in analysis::commentary(&coin_name, &table) {
        println!("  {} [{}] {}", tone_marker(c.tone), c.section, c.text);
    }

    Ok(())
}

fn stats_table(price: &Describe, volume: &Describe, config: &AppConfig) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_BORDERS_ONLY)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Stat").add_attribute(Attribute::Bold),
            Cell::new(format!(
                "Price ({})",
                config.vs_currency.as_str().to_uppercase()
            ))
            .add_attribute(Attribute::Bold)
            .set_alignment(CellAlignment::Right),
            Cell::new("Volume")
                .add_attribute(Attribute::Bold)
                .set_alignment(CellAlignment::Right),
        ]);

    let std_cell = |d: &Describe| match d.std {
        Some(std) => format!("{std:.2}"),
        None => "n/a".to_string(),
    };

    let rows: Vec<(&str, String, String)> = vec![
        ("count", price.count.to_string(), volume.count.to_string()),
        ("mean", format!("{:.2}", price.mean), format!("{:.2e}", volume.mean)),
        ("std", std_cell(price), std_cell(volume)),
        ("min", format!("{:.2}", price.min), format!("{:.2e}", volume.min)),
        ("25%", format!("{:.2}", price.q25), format!("{:.2e}", volume.q25)),
        ("50%", format!("{:.2}", price.median), format!("{:.2e}", volume.median)),
        ("75%", format!("{:.2}", price.q75), format!("{:.2e}", volume.q75)),
        ("max", format!("{:.2}", price.max), format!("{:.2e}", volume.max)),
    ];

    for (stat, p, v) in rows {
        table.add_row(vec![
            Cell::new(stat),
            Cell::new(p).set_alignment(CellAlignment::Right),
            Cell::new(v).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

fn tone_marker(tone: Tone) -> &'static str {
    match tone {
        Tone::Positive => "[+]",
        Tone::Negative => "[-]",
        Tone::Caution => "[!]",
        Tone::Neutral => "[i]",
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn format_timestamp(ts_ms: i64) -> String {
    let seconds = ts_ms / 1000;
    let nanoseconds = (ts_ms % 1000 * 1_000_000) as u32;
    DateTime::from_timestamp(seconds, nanoseconds)
        .map(|dt| dt.format("%d-%m-%Y %H:%M").to_string())
        .unwrap_or_else(|| "Unknown Time".to_string())
}
