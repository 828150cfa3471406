//! Plain-text benchmark report, one row per strategy.

use crate::stats::LatencyStats;

pub struct ReportRow {
  pub name:  &'static str,
  pub stats: LatencyStats,
}

pub fn print_section(title: &str, rows: &[ReportRow]) {
  println!();
  println!("{title} (milliseconds):");
  println!(
    "{:<20} {:>10} {:>10} {:>10} {:>10} {:>10}",
    "Strategy", "Mean", "Median", "StdDev", "Min", "Max"
  );
  println!("{}", "-".repeat(74));
  for row in rows {
    let s = &row.stats;
    println!(
      "{:<20} {:>10.4} {:>10.4} {:>10.4} {:>10.4} {:>10.4}",
      row.name, s.mean, s.median, s.stdev, s.min, s.max
    );
  }
}

/// The relative-performance summary line comparing the abstraction to the
/// direct-SQL baseline.
pub fn print_comparison(
  operation: &str,
  abstraction: &LatencyStats,
  baseline: &LatencyStats,
) {
  if abstraction.mean < baseline.mean {
    let improvement = (baseline.mean - abstraction.mean) / baseline.mean * 100.0;
    println!(
      "SCD abstraction is {improvement:.1}% faster than direct SQL for {operation}"
    );
  } else {
    let overhead = (abstraction.mean - baseline.mean) / baseline.mean * 100.0;
    println!(
      "SCD abstraction has {overhead:.1}% overhead compared to direct SQL for {operation}"
    );
  }
}
