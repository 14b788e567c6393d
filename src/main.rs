// src/main.rs - skewcomp CLI
use clap::{Parser, Subcommand};
use skewcomp::config::{CompensationMethod, Profile};
use skewcomp::gcode::startup;
use skewcomp::{GCodeShearTransformer, Plane, SkewError, commands};
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;

/// Print skew compensation toolkit
#[derive(Parser, Debug)]
#[command(
    name = "skewcomp",
    about = "Derive skew factors from a calibration print and apply them as firmware commands or a G-code transform."
)]
struct Cli {
    /// Path to the calibration profile (TOML)
    #[arg(short, long, default_value = "skewcomp.toml")]
    profile: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default calibration profile to the profile path
    Init,
    /// Compute and print the per-plane skew factors
    Factors,
    /// Print the firmware configuration command for the profile's method
    Command,
    /// Synchronize the firmware skew command into a start G-code file
    Sync {
        /// File holding the printer's start G-code
        file: PathBuf,
    },
    /// Post-process a G-code file, shearing movement coordinates
    Apply {
        /// Input G-code file
        input: PathBuf,
        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Apply the inverse shear (undo a previous correction)
        #[arg(long)]
        invert: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), SkewError> {
    match &cli.command {
        Commands::Init => {
            let profile = Profile::default();
            profile.save(&cli.profile)?;
            println!("wrote default profile to {}", cli.profile.display());
            Ok(())
        }
        Commands::Factors => {
            let profile = Profile::load(&cli.profile)?;
            let factors = profile.factors()?;
            for plane in Plane::ALL {
                match factors.get(plane) {
                    Some(f) => println!("{plane}: {f:.8}"),
                    None => println!("{plane}: not measured"),
                }
            }
            Ok(())
        }
        Commands::Command => {
            let profile = Profile::load(&cli.profile)?;
            match profile.method {
                CompensationMethod::Marlin => {
                    println!("{}", commands::marlin_command(&profile.factors()?));
                }
                CompensationMethod::Klipper => {
                    let planes = profile.measurements.planes();
                    println!("{}", commands::klipper_command(&planes, &profile.measurements)?);
                }
                CompensationMethod::Gcode => {
                    println!("profile uses G-code post-processing; run `skewcomp apply`");
                }
                CompensationMethod::None => {
                    println!("compensation is disabled in this profile");
                }
            }
            Ok(())
        }
        Commands::Sync { file } => {
            let profile = Profile::load(&cli.profile)?;
            let desired = firmware_command(&profile)?;
            let start_gcode = std::fs::read_to_string(file)?;
            let (synced, changed) = startup::sync_start_gcode(&start_gcode, desired.as_deref());
            if changed {
                std::fs::write(file, synced)?;
                tracing::info!("updated skew command in {}", file.display());
            } else {
                tracing::info!("{} already in sync", file.display());
            }
            Ok(())
        }
        Commands::Apply { input, output, invert } => {
            let profile = Profile::load(&cli.profile)?;
            match profile.method {
                CompensationMethod::Gcode | CompensationMethod::None => {}
                method => tracing::warn!(
                    "profile method is {method:?}; applying a G-code transform on top of \
                     firmware compensation corrects the same skew twice"
                ),
            }
            let mut factors = profile.factors()?;
            if *invert {
                factors = factors.inverted();
            }
            if !factors.is_active() {
                tracing::warn!("all skew factors are zero; output will equal input");
            }

            let reader = BufReader::new(std::fs::File::open(input)?);
            let mut transformer = GCodeShearTransformer::new(factors);
            match output {
                Some(path) => {
                    let writer = BufWriter::new(std::fs::File::create(path)?);
                    transformer.transform(reader, writer)?;
                }
                None => {
                    let stdout = std::io::stdout();
                    transformer.transform(reader, BufWriter::new(stdout.lock()))?;
                }
            }
            tracing::info!("rewrote {} movement lines", transformer.rewritten_lines());
            Ok(())
        }
    }
}

/// The tagged firmware command the start G-code should carry for this
/// profile, if its method is firmware-side.
fn firmware_command(profile: &Profile) -> Result<Option<String>, SkewError> {
    match profile.method {
        CompensationMethod::Marlin => {
            Ok(Some(startup::tag(&commands::marlin_command(&profile.factors()?))))
        }
        CompensationMethod::Klipper => {
            let planes = profile.measurements.planes();
            Ok(Some(startup::tag(&commands::klipper_command(&planes, &profile.measurements)?)))
        }
        CompensationMethod::None | CompensationMethod::Gcode => Ok(None),
    }
}
