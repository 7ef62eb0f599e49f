//! Ensemble anomaly detection example.
//!
//! Run with: cargo run --example detect_anomalies

use anofox_anomaly::prelude::*;
use chrono::{Duration, TimeZone, Utc};
use tracing_subscriber::EnvFilter;

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    println!("=== Ensemble Anomaly Detection Example ===\n");

    // Two weeks of simulated taxi trips: a daily demand cycle, a burst of
    // long trips on day 5 and a level shift in the second week.
    let start = Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap();
    let mut rows: Vec<(String, Option<f64>)> = Vec::new();
    for hour in 0..24 * 14 {
        let t = start + Duration::hours(hour);
        let daily = 4.0 + 3.0 * (2.0 * std::f64::consts::PI * (hour % 24) as f64 / 24.0).sin();
        let level = if hour >= 24 * 9 { 4.0 } else { 0.0 };
        for trip in 0..4 {
            let when = t + Duration::minutes(7 + 13 * trip);
            let distance = daily + level + 0.1 * ((hour * 31 + trip * 17) % 7) as f64;
            rows.push((when.format("%Y-%m-%d %H:%M:%S").to_string(), Some(distance)));
        }
    }
    let burst = start + Duration::hours(24 * 5 + 14);
    let burst_time = (burst + Duration::minutes(30)).format("%Y-%m-%d %H:%M:%S");
    rows.push((burst_time.to_string(), Some(250.0)));
    rows.push(("unknown".to_string(), Some(3.0)));

    let borrowed: Vec<(&str, Option<f64>)> = rows.iter().map(|(t, v)| (t.as_str(), *v)).collect();
    let table = match RawTable::from_text_rows("Start Time", "Trip Distance", &borrowed) {
        Ok(table) => table,
        Err(e) => {
            eprintln!("Failed to build table: {}", e);
            return;
        }
    };
    println!("Raw rows: {}", table.row_count());

    for (name, policy) in [
        ("Priority, 2 votes", VotingPolicy::default()),
        ("Priority, 1 vote", VotingPolicy::default().vote_threshold(1)),
        (
            "Directional, 1 vote",
            VotingPolicy::default()
                .vote_threshold(1)
                .labeling(LabelingScheme::Directional),
        ),
    ] {
        println!("\n--- {} ---", name);

        let config = DetectionConfig::default().voting(policy);
        let run = match detect_anomalies(&table, &config) {
            Ok(run) => run,
            Err(e) => {
                eprintln!("Detection failed: {}", e);
                continue;
            }
        };

        println!("Hourly points: {}", run.hourly.len());
        println!(
            "Seasonal strength: {:.3}, trend strength: {:.3}",
            run.decomposition.seasonal_strength(),
            run.decomposition.trend_strength()
        );
        println!("Anomalies: {}", run.anomalies.len());

        for anomaly in run.anomalies.iter().take(10) {
            println!(
                "  {}  {:<20} {:>3}%  [{}]",
                anomaly.timestamp.format("%Y-%m-%d %H:%M"),
                anomaly.label(),
                anomaly.confidence_percent(),
                anomaly.methods
            );
        }

        if let Some(first) = run.anomalies.first() {
            let detail = run.anomaly_detail(first);
            println!("  Detail window around first anomaly: {} hours", detail.len());
            if let Some(point) = detail.iter().find(|p| p.timestamp == first.timestamp) {
                println!(
                    "    value {:.2} = trend {:.2} + seasonal {:.2} + residual {:.2}",
                    point.value, point.trend, point.seasonal, point.residual
                );
            }
        }
    }

    println!("\n=== Example Complete ===");
}
