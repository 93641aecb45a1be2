use fieldbook::{RecordId, Repository};
use serde_json::{Value, json};

use crate::backend::{open_queue, persist};
use crate::cli::{BackendConfig, RecordArgs, RecordsCommand, TableArgs};
use crate::output::{OutputFormat, cell, print_json, print_table};

pub async fn run(
    command: RecordsCommand,
    config: &BackendConfig,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let repository = Repository::new(open_queue(config));
    match command {
        RecordsCommand::List(args) => list(&repository, args, format).await,
        RecordsCommand::Show(args) => show(&repository, args, format).await,
        RecordsCommand::Delete(args) => {
            repository
                .delete(&args.table, &RecordId::from(args.id.as_str()))
                .await?;
            persist(repository.queue(), config).await?;
            match format {
                OutputFormat::Human => println!("Deleted {}:{}", args.table, args.id),
                OutputFormat::Json => print_json(&json!({ "deleted": args.id }))?,
            }
            Ok(())
        }
        RecordsCommand::Clear(args) => {
            repository.clear(&args.table).await?;
            persist(repository.queue(), config).await?;
            match format {
                OutputFormat::Human => println!("Cleared table {}", args.table),
                OutputFormat::Json => print_json(&json!({ "cleared": args.table }))?,
            }
            Ok(())
        }
    }
}

async fn list(
    repository: &Repository,
    args: TableArgs,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let records = repository.load_all(&args.table).await?;

    match format {
        OutputFormat::Human => {
            if records.is_empty() {
                println!("No records in {}", args.table);
                return Ok(());
            }
            let rows: Vec<Vec<String>> = records
                .iter()
                .map(|r| {
                    vec![
                        r.id.to_string(),
                        r.version.to_string(),
                        r.mtime.clone().unwrap_or_default(),
                        r.summary.clone().unwrap_or_default(),
                    ]
                })
                .collect();
            print_table(&["ID", "VERSION", "MODIFIED", "SUMMARY"], &rows);
        }
        OutputFormat::Json => print_json(&records)?,
    }
    Ok(())
}

async fn show(
    repository: &Repository,
    args: RecordArgs,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let id = RecordId::from(args.id.as_str());
    let Some(record) = repository.load(&args.table, &id).await? else {
        return Err(format!("no record {} in {}", args.id, args.table).into());
    };

    if format == OutputFormat::Json {
        print_json(&record)?;
        return Ok(());
    }

    println!("ID:       {}", record.id);
    println!("Version:  {}", record.version);
    println!("Created:  {}", record.ctime.as_deref().unwrap_or("-"));
    println!("Modified: {}", record.mtime.as_deref().unwrap_or("-"));
    if let Some(summary) = &record.summary {
        println!("Summary:  {summary}");
    }
    if !record.tags.is_empty() {
        println!("Tags:     {}", record.tags.join(", "));
    }
    println!();

    // Form order first, then anything the descriptors no longer mention.
    let mut keys = repository.ordered_variables(&args.table).await?;
    keys.retain(|k| record.values.contains_key(k));
    for key in record.values.keys() {
        if !keys.contains(key) {
            keys.push(key.clone());
        }
    }
    let rows: Vec<Vec<String>> = keys
        .iter()
        .map(|k| {
            let value = record.values.get(k).unwrap_or(&Value::Null);
            vec![k.clone(), cell(value)]
        })
        .collect();
    print_table(&["VARIABLE", "VALUE"], &rows);
    Ok(())
}
