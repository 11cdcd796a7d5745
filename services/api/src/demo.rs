use crate::infra::{build_report_service, seed_from_path, InMemoryReportService};
use clap::Args;
use disaster_watch::config::AppConfig;
use disaster_watch::error::AppError;
use disaster_watch::reports::{
    AdvanceOutcome, Caller, Report, ReportFilter, ReportServiceError, ReportSubmission, Role,
};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Optional CSV export to seed the store instead of the built-in sample reports
    #[arg(long)]
    pub(crate) seed_csv: Option<PathBuf>,
    /// Latitude of the proximity search origin
    #[arg(long, default_value_t = 41.5868, allow_negative_numbers = true)]
    pub(crate) origin_lat: f64,
    /// Longitude of the proximity search origin
    #[arg(long, default_value_t = -93.625, allow_negative_numbers = true)]
    pub(crate) origin_lng: f64,
    /// Search radius in kilometres (defaults to the configured radius)
    #[arg(long)]
    pub(crate) radius_km: Option<f64>,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        seed_csv,
        origin_lat,
        origin_lng,
        radius_km,
    } = args;

    let config = AppConfig::load()?;
    let radius_km = radius_km.unwrap_or(config.proximity.default_radius_km);
    let service = build_report_service(config.verification);

    println!("Disaster report lifecycle demo");
    match seed_csv {
        Some(path) => {
            let stored = seed_from_path(&service, &path)?;
            println!("- seeded {stored} reports from {}", path.display());
        }
        None => {
            let stored = submit_samples(&service, origin_lat, origin_lng)?;
            println!("- submitted {stored} sample reports around ({origin_lat}, {origin_lng})");
        }
    }

    let found = service.nearby(origin_lat, origin_lng, radius_km, &ReportFilter::default())?;
    println!("\nReports within {radius_km} km");
    if found.is_empty() {
        println!("  (none)");
    }
    for entry in &found {
        println!(
            "  - {} | {:.2} km | {} [{}]",
            entry.report.id,
            entry.distance_in_km,
            entry.report.title,
            entry.report.category
        );
    }

    let Some(target) = found.first().map(|entry| entry.report.clone()) else {
        println!("\nNo nearby report to verify; demo complete.");
        return Ok(());
    };

    println!("\nCommunity verification for {}", target.id);
    let policy = service.policy();
    println!(
        "- policy: high at {} yes votes, medium at {}",
        policy.high_min_yes, policy.medium_min_yes
    );
    for (voter, choice) in [
        ("neighbour-1", "yes"),
        ("neighbour-2", "yes"),
        ("neighbour-3", "no"),
        ("neighbour-4", "yes"),
        ("neighbour-1", "no"),
    ] {
        let caller = Caller::new(voter, Role::Citizen);
        match service.cast_vote(&caller, &target.id, choice) {
            Ok(receipt) => println!(
                "  - {voter} voted {choice}: {} yes / {} no -> {}",
                receipt.tally.yes_count,
                receipt.tally.no_count,
                receipt.tally.confidence_level.label()
            ),
            Err(err @ ReportServiceError::DuplicateVote { .. }) => {
                println!("  - {voter} voted {choice}: refused ({err})")
            }
            Err(err) => return Err(err.into()),
        }
    }

    println!("\nStatus lifecycle for {}", target.id);
    let citizen = Caller::new(target.reporter_id.0.clone(), Role::Citizen);
    if let Err(err) = service.advance(&citizen, &target.id) {
        println!("  - reporter attempt refused ({err})");
    }

    let operator = Caller::new("operator-demo", Role::Operator);
    loop {
        match service.advance(&operator, &target.id)? {
            AdvanceOutcome::Advanced { change, .. } => println!(
                "  - {} -> {} at {}",
                change.from.label(),
                change.to.label(),
                change.at.to_rfc3339()
            ),
            AdvanceOutcome::AlreadyTerminal(report) => {
                render_summary(&report);
                break;
            }
        }
    }

    Ok(())
}

fn submit_samples(
    service: &InMemoryReportService,
    origin_lat: f64,
    origin_lng: f64,
) -> Result<usize, ReportServiceError> {
    // Offsets in degrees: roughly 1 km, 4 km, and 60 km north of the origin.
    let samples = [
        ("citizen-1", "Flooded underpass", "flood", 0.009, Some(0.0)),
        ("citizen-2", "Downed power line", "storm", 0.036, Some(0.0)),
        ("citizen-3", "Grass fire spreading", "wildfire", 0.54, Some(0.0)),
        ("citizen-4", "Road blocked by debris", "storm", 0.0, None),
    ];

    let mut stored = 0;
    for (reporter, title, category, lat_offset, lng_offset) in samples {
        let (lat, lng) = match lng_offset {
            Some(offset) => (
                Some((origin_lat + lat_offset).clamp(-90.0, 90.0)),
                Some(origin_lng + offset),
            ),
            None => (None, None),
        };
        let submission = ReportSubmission {
            title: title.to_string(),
            description: String::new(),
            category: category.to_string(),
            location_text: String::new(),
            lat,
            lng,
        };
        service.submit(&Caller::new(reporter, Role::Citizen), submission)?;
        stored += 1;
    }
    Ok(stored)
}

fn render_summary(report: &Report) {
    println!(
        "  - {} is {} | {} yes / {} no | confidence {}",
        report.id,
        report.status.label(),
        report.yes_count,
        report.no_count,
        report.confidence_level.label()
    );
}
