use bleb::report::{inspect, Content, ContainerReport, EntryReport, DEFAULT_INLINE_THRESHOLD};
use bleb::{DecodeOptions, Repository};
use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bleb", about = "Inspect bleb repository containers")]
struct Cli {
    /// Log decoder activity to stderr (repeat for more detail)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Copy)]
struct DecodeFlags {
    /// Enable span-capacity and format-version checks
    #[arg(long, conflicts_with = "lenient")]
    strict: bool,
    /// Ignore trailing directory bytes and use the legacy inline-payload offset
    #[arg(long)]
    lenient: bool,
}

impl DecodeFlags {
    fn options(self) -> DecodeOptions {
        if self.strict {
            DecodeOptions::strict()
        } else if self.lenient {
            DecodeOptions::lenient()
        } else {
            DecodeOptions::default()
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the header, root descriptor and every directory record
    Dump {
        input: PathBuf,
        /// Emit the report as JSON
        #[arg(long)]
        json: bool,
        /// Show the contents of entry streams shorter than this many bytes
        #[arg(long, default_value_t = DEFAULT_INLINE_THRESHOLD)]
        inline_threshold: u64,
        #[command(flatten)]
        decode: DecodeFlags,
    },
    /// List live object names
    List {
        input: PathBuf,
        #[command(flatten)]
        decode: DecodeFlags,
    },
    /// Retrieve an object from the repository
    Get {
        name: String,
        /// Repository file
        #[arg(short = 'R', long)]
        repository: PathBuf,
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        decode: DecodeFlags,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {

        // ── Dump ─────────────────────────────────────────────────────────────
        Commands::Dump { input, json, inline_threshold, decode } => {
            let mut file   = File::open(&input)?;
            let mut report = ContainerReport::default();
            let outcome    = inspect(&mut file, &mut report, &decode.options(), inline_threshold);

            if json {
                println!("{}", report.to_json()?);
            } else {
                print_report(&report);
            }
            // The failure is already part of the printed report.
            if outcome.is_err() {
                std::process::exit(1);
            }
        }

        // ── List ─────────────────────────────────────────────────────────────
        Commands::List { input, decode } => {
            let mut repo = Repository::open_file(&input, decode.options())?;
            for name in repo.names()? {
                println!("{name}");
            }
        }

        // ── Get ──────────────────────────────────────────────────────────────
        Commands::Get { name, repository, output, decode } => {
            let mut repo = Repository::open_file(&repository, decode.options())?;
            let data = repo.read_object(&name)?;
            match output {
                Some(path) => File::create(path)?.write_all(&data)?,
                None => {
                    let mut stdout = std::io::stdout().lock();
                    stdout.write_all(&data)?;
                    stdout.flush()?;
                }
            }
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_report(report: &ContainerReport) {
    if let Some(h) = &report.header {
        println!("Format version: {:02X}h", h.version);
        println!("Flags: core={:08X}h info={:08X}h", h.core_flags, h.info_flags);
    }
    if let Some(root) = &report.root {
        println!("Content Directory Stream:\t[location={}, length={}]", root.location, root.length);
    }

    for entry in &report.entries {
        match entry {
            EntryReport::Deleted { length, .. } => println!("  Deleted\t[length={length}]"),
            EntryReport::Object { length, flags, name, stream, inline_payload, content, warnings, .. } => {
                println!("  Object\t[length={length}, flags={flags:04X}]\t`{name}`");
                if let Some(d) = stream {
                    println!("    Stream Descriptor\t[location={}, length={}]", d.location, d.length);
                }
                if let Some(c) = content {
                    println!("{}", render(c));
                }
                if let Some(p) = inline_payload {
                    println!("    Inline Payload:\t{}", render(p));
                }
                for w in warnings {
                    println!("    Warning:\t{w}");
                }
            }
        }
    }

    for p in &report.problems {
        match p.offset {
            Some(offset) => eprintln!("error at directory offset {offset}: {}", p.message),
            None         => eprintln!("error: {}", p.message),
        }
    }
}

fn render(content: &Content) -> String {
    match content {
        Content::Text(text) => text.clone(),
        Content::Hex(hex)   => format!("<hex {hex}>"),
    }
}
