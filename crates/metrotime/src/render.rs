//! Console rendering of run reports.

use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use metrotime_core::conversion::ColumnSummary;
use metrotime_core::report::Sample;
use metrotime_core::repository::DateCount;
use metrotime_core::RunReport;

const RULE: &str =
    "======================================================================";
const ABSENT: &str = "(absent)";

pub fn print_report(report: &RunReport) {
    println!("{RULE}");
    println!("Overflow time conversion");
    println!("{RULE}");

    println!(
        "\n[1] Loaded {} records from {} ({}, blake3 {})",
        report.total_records,
        report.input_path,
        report.encoding,
        short_hash(&report.input_hash)
    );

    let next_day = report
        .base_date
        .succ_opt()
        .map(|date| date.to_string())
        .unwrap_or_else(|| "the next day".to_string());
    println!(
        "\n[2] Base date {}: hours 00-23 resolve to {}, 24-47 to {next_day}",
        report.base_date, report.base_date
    );
    println!("{}", summary_table(&[&report.arrival, &report.departure]));

    println!("\n[3] Departure samples");
    println!("Past midnight:");
    println!("{}", sample_table(&report.samples.overflow));
    println!("Same day:");
    println!("{}", sample_table(&report.samples.normal));

    println!(
        "\n[4] Stored {} rows in table {}",
        report.stored_records, report.table_name
    );
    println!("{}", distribution_table(&report.date_distribution));
    let undated = report.stored_records - report.distributed_records();
    if undated > 0 {
        println!("{undated} rows have no departure timestamp");
    }
    println!("{RULE}");
}

pub fn print_distribution(table: &str, total: i64, distribution: &[DateCount]) {
    println!("Table {table}: {total} rows");
    println!("{}", distribution_table(distribution));
}

fn summary_table(columns: &[&ColumnSummary]) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Source", "Derived", "Converted", "Absent", "Past midnight"]);
    for column in columns {
        table.add_row(vec![
            column.source.clone(),
            column.derived.clone(),
            column.converted.to_string(),
            column.absent.to_string(),
            column.overflow.to_string(),
        ]);
    }
    table
}

fn sample_table(samples: &[Sample]) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Row", "Raw", "Normalized"]);
    for sample in samples {
        table.add_row(vec![
            sample.row.to_string(),
            sample.raw.clone().unwrap_or_else(|| ABSENT.to_string()),
            sample
                .normalized
                .clone()
                .unwrap_or_else(|| ABSENT.to_string()),
        ]);
    }
    table
}

fn distribution_table(distribution: &[DateCount]) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Date", "Rows"]);
    for entry in distribution {
        table.add_row(vec![entry.date.clone(), entry.count.to_string()]);
    }
    table
}

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn short_hash(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}
