//! Rendering of provisioning reports.

use colored::Colorize;
use kitchen_extensions::{ProvisionReport, StageResult, StageStatus};

use crate::error::{CliError, Result};

fn status_label(status: StageStatus) -> colored::ColoredString {
    match status {
        StageStatus::Done => "done".green(),
        StageStatus::Skipped => "skipped".dimmed(),
        StageStatus::Failed => "failed".red().bold(),
        StageStatus::Blocked => "blocked".yellow(),
    }
}

fn print_result(result: &StageResult) {
    println!(
        "  {:<8} {:<40} {:<8} {}",
        result.stage.as_str().cyan(),
        result.name,
        status_label(result.status),
        result.detail.dimmed()
    );
}

/// Print `report` and turn failed entries into a [`CliError::Failed`].
pub fn finish(report: &ProvisionReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        for result in &report.results {
            print_result(result);
        }
        if !report.plan.is_empty() {
            println!("{} {}", "Order:".dimmed(), report.plan.join(" -> "));
        }
    }

    let failed = report.failures().count();
    if failed == 0 {
        if !json {
            println!("{} Provisioned {} extension(s)", "=>".blue().bold(), report.plan.len());
        }
        return Ok(());
    }
    Err(CliError::Failed {
        failed,
        total: report.results.len(),
        code: report.exit_code(),
    })
}
