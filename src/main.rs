//! Command-line front end for the herd ledger.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, error, info};

use herd_ledger::config::AppConfig;
use herd_ledger::logging::{init_logging, OperationTimer};
use herd_ledger::photo::fit_photo;
use herd_ledger::validation::{CalfForm, InputValidator, RecordForm};
use herd_ledger::{HerdError, HerdService, PhotoUpload, Workbook};

#[derive(Parser)]
#[command(name = "herd-ledger", author, version, about, long_about = None)]
struct Cli {
    /// Extra configuration file, applied after config/default and config/local
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Workbook directory (overrides store.workbook_dir)
    #[arg(short, long, global = true)]
    workbook: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the workbook and any missing sheet
    Init,
    /// Add a production record
    AddRecord {
        #[command(flatten)]
        record: RecordArgs,

        /// Photo of the cow (png, jpg, jpeg, gif, webp)
        #[arg(short, long)]
        photo: PathBuf,
    },
    /// Rewrite an existing production record
    EditRecord {
        /// Row number as shown by `records` (the header is row 1)
        #[arg(short, long)]
        row: usize,

        #[command(flatten)]
        record: RecordArgs,

        /// Replacement photo; the stored photo is kept when omitted
        #[arg(short, long)]
        photo: Option<PathBuf>,
    },
    /// List production records with their row numbers
    Records {
        /// Include the base64 photo text
        #[arg(long)]
        with_photos: bool,
    },
    /// Show one production record
    Record {
        #[arg(short, long)]
        row: usize,
    },
    /// List known cows, latest name per ID
    Cows,
    /// Show herd statistics
    Stats,
    /// Register a calf
    AddCalf(CalfArgs),
    /// List calf records
    Calves,
    /// Fit a photo to the encoded-length budget without storing it
    FitPhoto {
        #[arg(short, long)]
        photo: PathBuf,

        /// Budget in base64 characters (defaults to photo.max_encoded_len)
        #[arg(short, long)]
        budget: Option<usize>,

        /// Write the base64 text to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct RecordArgs {
    /// Person who milked
    #[arg(long)]
    operator: String,

    #[arg(long)]
    cow_id: String,

    #[arg(long)]
    cow_name: String,

    /// Litres produced (a decimal comma is accepted)
    #[arg(long)]
    litres: String,

    /// Age in years
    #[arg(long)]
    age: String,

    /// Productiva, No Productiva or En Reposo
    #[arg(long)]
    status: String,

    /// Sí or No
    #[arg(long)]
    calved: String,

    /// Sí or No
    #[arg(long)]
    dry: String,

    #[arg(long)]
    offspring: String,

    #[arg(long)]
    births: String,

    /// Vaccination tag; repeat for several
    #[arg(long = "vaccination")]
    vaccinations: Vec<String>,

    /// Ailment tag; repeat for several, or "None"
    #[arg(long = "ailment")]
    ailments: Vec<String>,
}

impl From<RecordArgs> for RecordForm {
    fn from(args: RecordArgs) -> Self {
        Self {
            operator: args.operator,
            cow_id: args.cow_id,
            cow_name: args.cow_name,
            litres: args.litres,
            age: args.age,
            status: args.status,
            calved: args.calved,
            dry: args.dry,
            offspring: args.offspring,
            births: args.births,
            vaccinations: args.vaccinations,
            ailments: args.ailments,
        }
    }
}

#[derive(Args)]
struct CalfArgs {
    #[arg(long)]
    mother_id: String,

    /// Defaults to the latest recorded name for the mother ID
    #[arg(long, default_value = "")]
    mother_name: String,

    #[arg(long)]
    calf_id: String,

    #[arg(long)]
    calf_name: String,

    /// YYYY-MM-DD
    #[arg(long)]
    birth_date: String,

    /// Hembra or Macho
    #[arg(long)]
    sex: String,

    #[arg(long, default_value = "")]
    notes: String,
}

impl From<CalfArgs> for CalfForm {
    fn from(args: CalfArgs) -> Self {
        Self {
            mother_id: args.mother_id,
            mother_name: args.mother_name,
            calf_id: args.calf_id,
            calf_name: args.calf_name,
            birth_date: args.birth_date,
            sex: args.sex,
            notes: args.notes,
        }
    }
}

#[derive(Serialize)]
struct FitReport<'a> {
    #[serde(flatten)]
    photo: &'a herd_ledger::photo::FittedPhoto,
    encoded_len: usize,
    budget: usize,
    output: Option<&'a Path>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load configuration
    let config = match AppConfig::load_from(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging; the guard flushes the file writer on exit
    let _guard = match init_logging(&config.logging) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("Error: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    match run(cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let kind = err
                .chain()
                .find_map(|cause| cause.downcast_ref::<HerdError>())
                .map_or("internal", HerdError::kind);
            error!(kind, error = %format!("{err:#}"), "Command failed");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, config: &AppConfig) -> Result<()> {
    let workbook_dir = cli.workbook.unwrap_or_else(|| config.workbook_path());
    info!(workbook = %workbook_dir.display(), "Starting herd-ledger");

    let service = HerdService::new(Box::new(Workbook::new(&workbook_dir)), config.photo.clone());
    let timer = OperationTimer::new("command");

    match cli.command {
        Commands::Init => {
            service.initialize()?;
            info!(workbook = %workbook_dir.display(), "Workbook ready");
        }
        Commands::AddRecord { record, photo } => {
            let upload = read_upload(&photo)?;
            let stored = service.submit_record(&record.into(), &upload)?;
            print_json(&stored)?;
        }
        Commands::EditRecord { row, record, photo } => {
            let upload = photo.as_deref().map(read_upload).transpose()?;
            let updated = service.edit_record(row, &record.into(), upload.as_ref())?;
            print_json(&updated)?;
        }
        Commands::Records { with_photos } => {
            let mut records = service.records()?;
            if !with_photos {
                for stored in &mut records {
                    stored.record.photo.clear();
                }
            }
            print_json(&records)?;
        }
        Commands::Record { row } => print_json(&service.record(row)?)?,
        Commands::Cows => print_json(&service.cows()?)?,
        Commands::Stats => match service.statistics()? {
            Some(stats) => print_json(&stats)?,
            None => {
                info!("No production records yet");
                print_json(&serde_json::Value::Null)?;
            }
        },
        Commands::AddCalf(calf) => print_json(&service.register_calf(&calf.into())?)?,
        Commands::Calves => print_json(&service.calves()?)?,
        Commands::FitPhoto { photo, budget, output } => {
            let upload = read_upload(&photo)?;
            let size = u64::try_from(upload.bytes.len()).unwrap_or(u64::MAX);
            InputValidator::validate_photo_upload(&upload.file_name, size, &config.photo)?;

            let budget = budget.unwrap_or(config.photo.max_encoded_len);
            let fitted = fit_photo(&upload.bytes, budget)?;
            if let Some(path) = &output {
                fs::write(path, &fitted.encoded)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
            }
            print_json(&FitReport {
                photo: &fitted,
                encoded_len: fitted.encoded_len(),
                budget,
                output: output.as_deref(),
            })?;
        }
    }

    let elapsed_ms = timer.finish();
    debug!(elapsed_ms, metrics = ?service.metrics(), "Command finished");
    Ok(())
}

fn read_upload(path: &Path) -> Result<PhotoUpload> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read photo {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(PhotoUpload { file_name, bytes })
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value).context("Failed to write JSON output")?;
    writeln!(stdout)?;
    Ok(())
}
