//! Learning statistics and pattern listings for the CLI.
//!
//! `jobsight stats` gives a quick picture of what the store has learned:
//! correction counts by origin, field and domain, learned-pattern scopes
//! and confidence buckets, and discovered patterns by kind. `jobsight
//! patterns` lists the individual rules.

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use jobsight_core::learning::{LearningStats, CONFIDENCE_BUCKETS};

use crate::harness::Harness;

/// Run the stats command: print a summary, or JSON with `json = true`.
pub fn run_stats(harness: &Harness, json: bool) -> Result<()> {
    let stats = harness.learning_stats();
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }
    print!("{}", render_stats(harness, &stats));
    Ok(())
}

/// Render the stats summary as text.
pub fn render_stats(harness: &Harness, stats: &LearningStats) -> String {
    let mut out = String::new();
    let state = match &harness.config().state.path {
        Some(path) => path.display().to_string(),
        None => "(in memory only)".to_string(),
    };
    let last = stats
        .last_correction_at
        .map(format_ts_relative)
        .unwrap_or_else(|| "never".to_string());

    out.push_str("jobsight — Learning Stats\n");
    out.push_str("=========================\n\n");
    out.push_str(&format!("  State:        {}\n\n", state));
    out.push_str(&format!("  Corrections:  {}\n", stats.total_corrections));
    out.push_str(&format!("  Last:         {}\n", last));
    out.push_str(&format!(
        "  Patterns:     {} (domain {}, family {}, global {})\n",
        stats.learned_patterns, stats.domain_patterns, stats.family_patterns, stats.global_patterns
    ));
    out.push_str(&format!("  Discovered:   {}\n", stats.discovered_patterns));
    out.push_str(&format!("  Applications: {}\n", stats.pattern_applications));

    push_table(&mut out, "By origin", "ORIGIN", &stats.corrections_by_origin);
    push_table(&mut out, "By field", "FIELD", &stats.corrections_by_field);
    push_table(&mut out, "By domain", "DOMAIN", &stats.corrections_by_domain);

    if stats.learned_patterns > 0 {
        out.push_str("\n  Pattern confidence:\n");
        for (bucket, _) in CONFIDENCE_BUCKETS {
            let count = stats.patterns_by_confidence.get(bucket).copied().unwrap_or(0);
            out.push_str(&format!("  {:<24} {:>6}\n", bucket, count));
        }
    }
    push_table(&mut out, "Discovered by kind", "KIND", &stats.discovered_by_kind);
    out.push('\n');
    out
}

fn push_table(out: &mut String, title: &str, header: &str, counts: &BTreeMap<String, usize>) {
    if counts.is_empty() {
        return;
    }
    let mut rows: Vec<(&String, &usize)> = counts.iter().collect();
    rows.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

    out.push_str(&format!("\n  {}:\n", title));
    out.push_str(&format!("  {:<32} {:>6}\n", header, "COUNT"));
    out.push_str(&format!("  {}\n", "-".repeat(40)));
    for (name, count) in rows {
        out.push_str(&format!("  {:<32} {:>6}\n", name, count));
    }
}

/// Run the patterns command: list learned and discovered patterns,
/// optionally for one domain.
pub fn run_patterns(harness: &Harness, domain: Option<&str>) -> Result<()> {
    let store = harness.store();
    let learned = match domain {
        Some(d) => store.patterns_for_domain(d),
        None => store.learned_patterns(),
    };
    let discovered: Vec<_> = store
        .discovered_patterns()
        .into_iter()
        .filter(|p| domain.is_none() || p.domain.as_deref() == domain)
        .collect();

    if learned.is_empty() && discovered.is_empty() {
        println!("No patterns learned yet.");
        return Ok(());
    }

    if !learned.is_empty() {
        println!(
            "{:<10} {:<24} {:<28} {:<28} {:>5} {:>4}   {}",
            "FIELD", "SCOPE", "MATCH", "REPLACEMENT", "CONF", "USES", "UPDATED"
        );
        println!("{}", "-".repeat(120));
        for p in &learned {
            println!(
                "{:<10} {:<24} {:<28} {:<28} {:>5.2} {:>4}   {}",
                p.field.as_str(),
                truncate(&p.scope.to_string(), 24),
                truncate(&p.match_pattern, 28),
                truncate(&p.replacement, 28),
                p.confidence,
                p.usage_count,
                format_ts_relative(p.updated_at)
            );
        }
    }

    if !discovered.is_empty() {
        if !learned.is_empty() {
            println!();
        }
        println!(
            "{:<10} {:<24} {:<36} {:>5} {:>4}   {}",
            "FIELD", "DOMAIN", "DESCRIPTOR", "CONF", "HITS", "EXAMPLE"
        );
        println!("{}", "-".repeat(100));
        for p in &discovered {
            println!(
                "{:<10} {:<24} {:<36} {:>5.2} {:>4}   {}",
                p.field.as_str(),
                truncate(p.domain.as_deref().unwrap_or("-"), 24),
                truncate(&p.descriptor, 36),
                p.confidence,
                p.hits,
                p.examples.last().map(String::as_str).unwrap_or("")
            );
        }
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Format a timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: DateTime<Utc>) -> String {
    let delta = (Utc::now() - ts).num_seconds();

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M").to_string()
}
