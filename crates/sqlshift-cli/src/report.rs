use sqlshift_migrate::{MigrationState, MigrationStatus, RunReport};

/// Print the outcome of an `up` run.
pub fn print_report(report: &RunReport) {
    let Some(before) = report.watermark_before else {
        println!("No migrations found.");
        return;
    };
    let after = report.watermark_after.unwrap_or(before);

    if report.applied.is_empty() {
        println!("Database is up to date at version {after}.");
        return;
    }

    let versions: Vec<String> = report.applied.iter().map(u32::to_string).collect();
    println!(
        "Applied {} migration{}: {}",
        report.applied.len(),
        if report.applied.len() == 1 { "" } else { "s" },
        versions.join(", ")
    );
    println!(
        "Database at version {after} (was {before}), took {:.2?}",
        report.elapsed
    );
}

/// Print one row per discovered migration.
pub fn print_status(statuses: &[MigrationStatus]) {
    if statuses.is_empty() {
        println!("No migrations found.");
        return;
    }

    let name_w = statuses
        .iter()
        .map(|s| s.name.len())
        .max()
        .unwrap_or(0)
        .max("NAME".len());

    println!("{:>8}  {:<name_w$}  STATE", "VERSION", "NAME");
    for status in statuses {
        let state = match status.state {
            MigrationState::Applied => "applied",
            MigrationState::Pending => "pending",
        };
        println!("{:>8}  {:<name_w$}  {state}", status.version, status.name);
    }

    let pending = statuses
        .iter()
        .filter(|s| s.state == MigrationState::Pending)
        .count();
    println!();
    println!("{pending} pending of {}", statuses.len());
}
