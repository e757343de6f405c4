//! Local-only commands: merge, export and query.
use crate::catalog;
use crate::cli::{ExportArgs, MergeArgs, QueryArgs};
use crate::export::export_workbook;
use crate::merge::merge;
use crate::record::Record;
use crate::store::{load_records, write_records};
use anyhow::{anyhow, Context, Result};

pub fn run_merge(args: &MergeArgs) -> Result<()> {
    let primary = load_records(&args.primary)?;
    let secondary = load_records(&args.secondary)?;
    let outcome = merge(&primary, &secondary, args.policy);
    write_records(&args.out, &outcome.records)?;

    if args.json {
        let text = serde_json::to_string_pretty(&outcome.stats).context("serialize stats")?;
        println!("{text}");
    }
    if !args.quiet {
        let stats = &outcome.stats;
        eprintln!(
            "merge: {} primary + {} secondary -> {} records ({} added, {} updated, {} unchanged, {} rejected)",
            stats.primary_in,
            stats.secondary_in,
            stats.output,
            stats.added,
            stats.updated,
            stats.unchanged,
            stats.rejected
        );
        for rejection in &outcome.rejections {
            eprintln!("merge: {rejection}");
        }
        eprintln!("merge: wrote {}", args.out.display());
    }
    Ok(())
}

pub fn run_export(args: &ExportArgs) -> Result<()> {
    let records = load_records(&args.input)?;
    let stats = export_workbook(&records, &args.output)?;
    eprintln!(
        "export: {} awards, {} winning books, {} competitors, {} categories -> {}",
        stats.awards,
        stats.winning_books,
        stats.competitors,
        stats.categories,
        args.output.display()
    );
    Ok(())
}

/// Print matching records (or category names) as JSON on stdout.
pub fn run_query(args: &QueryArgs) -> Result<()> {
    let records = load_records(&args.input)?;
    let text = if let Some(name) = &args.name {
        let record = catalog::find_by_name(&records, name)
            .ok_or_else(|| anyhow!("no award named {name:?} in {}", args.input.display()))?;
        serde_json::to_string_pretty(record)
    } else if let Some(category) = &args.category {
        serde_json::to_string_pretty(&owned(catalog::by_category(&records, category)))
    } else if let Some(organization) = &args.organization {
        serde_json::to_string_pretty(&owned(catalog::by_organization(&records, organization)))
    } else if args.categories {
        serde_json::to_string_pretty(&catalog::all_categories(&records))
    } else {
        return Err(anyhow!(
            "query needs one of --name, --category, --organization or --categories"
        ));
    }
    .context("serialize query result")?;
    println!("{text}");
    Ok(())
}

fn owned(records: Vec<&Record>) -> Vec<Record> {
    records.into_iter().cloned().collect()
}
