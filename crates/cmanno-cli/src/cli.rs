use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Tony Kan, Ted Yu, William A. Goddard III, Victor Wai Tak Kam",
    version,
    about = "cmanno - Detect, graft and validate C-mannosylated tryptophans in crystal structures.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Find tryptophans with unmodelled density at their C-mannosylation anchor.
    Detect(DetectArgs),
    /// Detect sites, graft glycans onto them and keep the ones that fit the density.
    Graft(GraftArgs),
    /// Strip existing C-mannoses, graft them afresh and validate the result.
    Regraft(GraftArgs),
    /// Run every structure of a job store in isolated worker processes.
    Batch(BatchArgs),
    /// Run a single job store entry and print its JSON report.
    #[command(hide = true)]
    RunJob(RunJobArgs),
    /// Maintain the job store.
    Jobs(JobsArgs),
}

/// Configuration sources shared by every subcommand that runs the pipeline.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the occupancy threshold with an explicit value.
    #[arg(short, long, value_name = "FLOAT", conflicts_with = "calibration")]
    pub threshold: Option<f64>,

    /// Derive the occupancy threshold from the resolution with a named calibration
    /// ('grafting' or 'survey').
    #[arg(long, value_name = "NAME")]
    pub calibration: Option<String>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S graft.rscc-threshold=0.6
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// A reciprocal-space or real-space source for the difference density.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct MapSource {
    /// A precomputed CCP4/MRC difference map.
    #[arg(long, value_name = "PATH")]
    pub map: Option<PathBuf>,

    /// Reflection data; the difference map is computed from its DELFWT/PHDELWT columns.
    #[arg(long, value_name = "PATH")]
    pub mtz: Option<PathBuf>,
}

/// Arguments for the `detect` subcommand.
#[derive(Args, Debug)]
pub struct DetectArgs {
    /// Path to the input model (PDB format).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    #[command(flatten)]
    pub source: MapSource,

    /// Write every scored candidate to a CSV table.
    #[arg(long, value_name = "PATH")]
    pub csv: Option<PathBuf>,

    #[command(flatten)]
    pub config: ConfigArgs,
}

/// Arguments for the `graft` and `regraft` subcommands.
#[derive(Args, Debug)]
pub struct GraftArgs {
    /// Path to the input model (PDB format).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Reflection data used for the maps and for refinement.
    #[arg(long, required = true, value_name = "PATH")]
    pub mtz: PathBuf,

    /// Donor model holding a tryptophan with the glycan to graft.
    #[arg(short, long, value_name = "PATH")]
    pub donor: Option<PathBuf>,

    /// Which glycan of the donor to graft, counting from zero.
    #[arg(long, value_name = "INT")]
    pub glycan_index: Option<usize>,

    /// Path for the validated output model. A CSV summary is written next to it.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Keep intermediate refinement files in this directory instead of a temporary one.
    #[arg(short, long, value_name = "PATH")]
    pub workspace: Option<PathBuf>,

    #[command(flatten)]
    pub config: ConfigArgs,
}

/// Arguments for the `batch` subcommand.
#[derive(Args, Debug)]
pub struct BatchArgs {
    /// The job store to run.
    #[arg(long, required = true, value_name = "PATH")]
    pub store: PathBuf,

    /// Append one line per failed structure to this file.
    #[arg(long, required = true, value_name = "PATH")]
    pub journal: PathBuf,

    /// Write the run-level summary table to this CSV file.
    #[arg(long, value_name = "PATH")]
    pub summary: Option<PathBuf>,

    /// Only run these structure ids instead of the whole store.
    #[arg(long = "id", value_name = "ID")]
    pub ids: Vec<String>,

    /// Override the number of concurrent workers.
    #[arg(short, long, value_name = "INT")]
    pub workers: Option<usize>,

    /// Override the per-structure wall-clock limit.
    #[arg(long, value_name = "SECONDS")]
    pub timeout_secs: Option<u64>,

    /// Override the per-structure virtual-memory cap; 0 disables it.
    #[arg(long, value_name = "MIB")]
    pub memory_mib: Option<u64>,

    #[command(flatten)]
    pub config: ConfigArgs,
}

/// Arguments for the hidden `run-job` subcommand.
#[derive(Args, Debug)]
pub struct RunJobArgs {
    /// The job store holding the entry.
    #[arg(long, required = true, value_name = "PATH")]
    pub store: PathBuf,

    /// Structure id of the entry.
    #[arg(long, required = true, value_name = "ID")]
    pub id: String,

    /// Scratch directory for the run.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub workspace: PathBuf,

    #[command(flatten)]
    pub config: ConfigArgs,
}

/// Arguments for the `jobs` subcommand.
#[derive(Args, Debug)]
pub struct JobsArgs {
    /// The job store to edit. It is created on first write.
    #[arg(long, required = true, value_name = "PATH")]
    pub store: PathBuf,

    #[command(subcommand)]
    pub command: JobsCommands,
}

/// Available commands for job store maintenance.
#[derive(Subcommand, Debug)]
pub enum JobsCommands {
    /// Add an entry, replacing any entry with the same id.
    Add {
        /// Structure id.
        #[arg(required = true)]
        id: String,
        /// Receiver model (PDB format).
        #[arg(long, required = true, value_name = "PATH")]
        receiver: PathBuf,
        /// Reflection data for the receiver.
        #[arg(long, required = true, value_name = "PATH")]
        mtz: PathBuf,
        /// Where the validated model goes.
        #[arg(short, long, required = true, value_name = "PATH")]
        output: PathBuf,
        /// Graft at these residues instead of detecting sites. Format: CHAIN:NUMBER.
        #[arg(long = "site", value_name = "CHAIN:NUMBER")]
        sites: Vec<String>,
        /// Donor model for the listed sites.
        #[arg(long, value_name = "PATH", requires = "sites")]
        donor: Option<PathBuf>,
        /// Which glycan of the donor to graft at the listed sites.
        #[arg(long, value_name = "INT", default_value_t = 0)]
        glycan_index: usize,
    },
    /// List the entries of the store.
    List,
    /// Remove an entry.
    Remove {
        #[arg(required = true)]
        id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_requires_exactly_one_map_source() {
        assert!(Cli::try_parse_from(["cmanno", "detect", "-i", "in.pdb"]).is_err());
        assert!(
            Cli::try_parse_from([
                "cmanno", "detect", "-i", "in.pdb", "--map", "a.ccp4", "--mtz", "a.mtz"
            ])
            .is_err()
        );

        let cli = Cli::parse_from(["cmanno", "detect", "-i", "in.pdb", "--map", "a.ccp4"]);
        let Commands::Detect(args) = cli.command else {
            panic!("Expected 'detect' subcommand");
        };
        assert_eq!(args.source.map, Some(PathBuf::from("a.ccp4")));
        assert!(args.source.mtz.is_none());
    }

    #[test]
    fn threshold_and_calibration_are_exclusive() {
        let result = Cli::try_parse_from([
            "cmanno",
            "detect",
            "-i",
            "in.pdb",
            "--map",
            "a.ccp4",
            "-t",
            "0.5",
            "--calibration",
            "survey",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::parse_from([
            "cmanno", "graft", "-i", "in.pdb", "--mtz", "in.mtz", "-o", "out.pdb", "-vv", "-j",
            "4",
        ]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.threads, Some(4));
        assert!(matches!(cli.command, Commands::Graft(_)));
    }

    #[test]
    fn jobs_add_collects_repeated_sites() {
        let cli = Cli::parse_from([
            "cmanno", "jobs", "--store", "jobs.json", "add", "1abc", "--receiver", "r.pdb",
            "--mtz", "r.mtz", "-o", "out.pdb", "--site", "A:10", "--site", "B:7", "--donor",
            "d.pdb",
        ]);
        let Commands::Jobs(JobsArgs {
            command: JobsCommands::Add { sites, donor, .. },
            ..
        }) = cli.command
        else {
            panic!("Expected 'jobs add' subcommand");
        };
        assert_eq!(sites, vec!["A:10", "B:7"]);
        assert_eq!(donor, Some(PathBuf::from("d.pdb")));
    }

    #[test]
    fn run_job_is_parsable_though_hidden() {
        let cli = Cli::parse_from([
            "cmanno", "run-job", "--store", "jobs.json", "--id", "1abc", "-w", "/tmp/x",
        ]);
        assert!(matches!(cli.command, Commands::RunJob(RunJobArgs { ref id, .. }) if id == "1abc"));
    }
}
