use fieldbook::Repository;

use crate::backend::open_queue;
use crate::cli::{BackendConfig, TableArgs};
use crate::output::{OutputFormat, print_json, print_table};

pub async fn run(
    args: TableArgs,
    config: &BackendConfig,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let repository = Repository::new(open_queue(config));
    let order = repository.ordered_variables(&args.table).await?;
    let mut descriptors = repository.list_variables(&args.table).await?;
    descriptors.sort_by_key(|d| order.iter().position(|k| *k == d.key));

    match format {
        OutputFormat::Human => {
            if descriptors.is_empty() {
                println!("No variables recorded for {}", args.table);
                return Ok(());
            }
            let rows: Vec<Vec<String>> = descriptors
                .iter()
                .enumerate()
                .map(|(i, d)| {
                    vec![
                        (i + 1).to_string(),
                        d.key.clone(),
                        d.group.clone().unwrap_or_default(),
                        d.kind.clone().unwrap_or_default(),
                        if d.multi { "yes" } else { "" }.to_string(),
                    ]
                })
                .collect();
            print_table(&["#", "VARIABLE", "GROUP", "TYPE", "MULTI"], &rows);
        }
        OutputFormat::Json => print_json(&descriptors)?,
    }
    Ok(())
}
