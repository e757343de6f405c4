//! `awards fetch` and `awards push` against the collaborative store.
use crate::cli::{FetchArgs, PushArgs};
use crate::config::{require_secret, resolve_config, PipelineConfig, REMOTE_API_KEY_ENV};
use crate::error::{FatalConfigurationError, RemoteError};
use crate::remote::{self, AirtableClient, RowUpdate};
use crate::store::{load_records, write_json, write_records};
use anyhow::{Context, Result};

fn client(config: &PipelineConfig) -> Result<AirtableClient> {
    let api_key = require_secret(REMOTE_API_KEY_ENV)?;
    Ok(AirtableClient::new(
        config.remote.clone(),
        api_key,
        config.retry.policy(),
    ))
}

/// Unusable-store failures end the run as configuration errors.
fn remote_failure(err: RemoteError) -> anyhow::Error {
    if err.is_fatal() {
        FatalConfigurationError(err.to_string()).into()
    } else {
        anyhow::Error::new(err)
    }
}

pub fn run_fetch(args: &FetchArgs) -> Result<()> {
    let config = resolve_config(args.config.as_deref())?;
    let mut fields = config.remote.fields.clone();
    if let Some(field) = &args.field {
        fields.name = field.clone();
    }
    if let Some(field) = &args.category_field {
        fields.categories = field.clone();
    }
    let client = client(&config)?;
    if !args.quiet {
        eprintln!(
            "fetch: reading {:?} from base {}",
            args.table, config.remote.base_id
        );
    }

    let count = if args.names_only {
        let names =
            remote::fetch_all(&client, &args.table, &fields.name).map_err(remote_failure)?;
        write_json(&args.out, &names)?;
        names.len()
    } else {
        let records =
            remote::fetch_awards(&client, &args.table, &fields).map_err(remote_failure)?;
        write_records(&args.out, &records)?;
        records.len()
    };
    if !args.quiet {
        eprintln!("fetch: wrote {count} entries to {}", args.out.display());
    }
    Ok(())
}

pub fn run_push(args: &PushArgs) -> Result<()> {
    let config = resolve_config(args.config.as_deref())?;
    let records = load_records(&args.input)?;
    let updates: Vec<RowUpdate> = records
        .iter()
        .filter_map(|record| remote::row_update_for(record, &config.remote.fields))
        .collect();
    let skipped = records.len() - updates.len();
    if skipped > 0 {
        tracing::warn!(skipped, "records without a remote row id are not pushed");
    }

    if args.dry_run {
        let text = serde_json::to_string_pretty(&updates).context("serialize updates")?;
        println!("{text}");
        return Ok(());
    }
    let client = client(&config)?;
    let updated = remote::update_rows(&client, &args.table, &updates).map_err(remote_failure)?;
    if !args.quiet {
        eprintln!(
            "push: updated {updated} rows in {:?} ({skipped} records had no row id)",
            args.table
        );
    }
    Ok(())
}
