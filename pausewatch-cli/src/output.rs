use owo_colors::OwoColorize;
use pausewatch_core::{OperationResult, Resource, Summary};

pub fn print_resources(resources: &[&Resource]) {
    if resources.is_empty() {
        println!("no resources found");
        return;
    }
    for r in resources {
        println!(
            "{:<18} {:<14} {:<22} {}",
            r.kind.to_string().cyan(),
            r.region,
            r.id,
            r.state.yellow()
        );
    }
    println!("{} resource(s)", resources.len());
}

pub fn print_results(results: &[OperationResult]) {
    for r in results {
        let status = if r.success { "ok".green().to_string() } else { "fail".red().to_string() };
        println!("[{status}] {} {} ({}): {}", r.resource.kind, r.resource.id, r.resource.region, r.message);
    }
}

pub fn print_summary(summary: &Summary) {
    println!(
        "{} total, {} succeeded, {} failed ({:.0}% success rate)",
        summary.total,
        summary.succeeded.to_string().green(),
        summary.failed.to_string().red(),
        summary.success_rate * 100.0
    );
    for (kind, count) in &summary.by_kind {
        println!("  {kind}: {count}");
    }
    for failure in &summary.failures {
        println!("  {} {} ({}): {}", failure.kind.to_string().red(), failure.id, failure.region, failure.message);
    }
}
