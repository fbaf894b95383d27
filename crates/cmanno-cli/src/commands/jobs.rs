use crate::cli::{JobsArgs, JobsCommands};
use crate::error::{CliError, Result};
use cmanno::core::io::store::{JobRecord, JobStore, PlannedGraft};
use tracing::info;

pub async fn run(args: JobsArgs) -> Result<()> {
    let mut store = JobStore::open(&args.store)?;
    match args.command {
        JobsCommands::Add {
            id,
            receiver,
            mtz,
            output,
            sites,
            donor,
            glycan_index,
        } => {
            let glycosylations = match (sites.is_empty(), donor) {
                (true, _) => Vec::new(),
                (false, Some(donor)) => sites
                    .iter()
                    .map(|site| {
                        parse_site(site).map(|(chain, residue)| PlannedGraft {
                            donor_path: donor.clone(),
                            glycan_index,
                            receiving_chain_index: chain,
                            receiving_res_index: residue,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?,
                (false, None) => {
                    return Err(CliError::Argument(
                        "--site needs a --donor to graft".to_string(),
                    ));
                }
            };
            let planned = glycosylations.len();
            store.upsert(
                &id,
                JobRecord {
                    receiver_path: receiver,
                    mtz_path: mtz,
                    output_path: output,
                    glycosylations,
                },
            )?;
            info!(id = %id, planned, "Job stored.");
            println!("✓ Stored '{}' ({} planned graft(s)).", id, planned);
        }
        JobsCommands::List => {
            if store.is_empty() {
                println!("The job store at {} is empty.", store.path().display());
            }
            for (id, job) in store.records() {
                let plan = if job.glycosylations.is_empty() {
                    "detect".to_string()
                } else {
                    format!("{} planned", job.glycosylations.len())
                };
                println!(
                    "{}\t{}\t{}\t{}",
                    id,
                    job.receiver_path.display(),
                    job.output_path.display(),
                    plan
                );
            }
        }
        JobsCommands::Remove { id } => match store.remove(&id)? {
            Some(_) => println!("✓ Removed '{}'.", id),
            None => {
                return Err(CliError::Argument(format!(
                    "no job '{}' in {}",
                    id,
                    store.path().display()
                )));
            }
        },
    }
    Ok(())
}

/// Parses a `CHAIN:NUMBER` residue reference.
fn parse_site(site: &str) -> Result<(String, isize)> {
    let invalid = || CliError::Argument(format!("invalid site '{}': expected CHAIN:NUMBER", site));
    let (chain, number) = site.split_once(':').ok_or_else(invalid)?;
    let chain = chain.trim();
    if chain.is_empty() {
        return Err(invalid());
    }
    let number = number.trim().parse().map_err(|_| invalid())?;
    Ok((chain.to_string(), number))
}
