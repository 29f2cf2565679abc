//! # farcall CLI Entry Point
//!
//! ## Usage
//!
//! ```bash
//! # Run a definition and print its result as JSON
//! farcall call -d 'add=(a, b) => a + b' add '[2, 3]'
//!
//! # Load helpers first, force the sandboxed frame transport
//! farcall call -i lib/math.js -d 'hyp=(a, b) => hypot(a, b)' --frame hyp '[3, 4]'
//!
//! # Print the generated bootstrap program
//! farcall bootstrap --definitions defs.json
//! ```
//!
//! A remote exception prints `Type: message` on stderr and exits with status 1.

use anyhow::{anyhow, Result};
use argh::FromArgs;
use farcall::{Bridge, FarcallError};
use farcall_cli::{parse_call_args, BridgeArgs};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

#[derive(FromArgs)]
/// farcall - run JavaScript definitions in an isolated context
struct Cli {
    #[argh(subcommand)]
    command: Commands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Call(CallArgs),
    Bootstrap(BootstrapArgs),
}

// Output is raw JSON (no pretty-printing) so it can be piped into other tools.
#[derive(FromArgs)]
#[argh(subcommand, name = "call")]
/// run a definition and print its result
struct CallArgs {
    /// definition as key=source; may be repeated
    #[argh(option, short = 'd', long = "define")]
    definitions: Vec<String>,

    /// JSON file with definitions
    #[argh(option, long = "definitions")]
    definitions_file: Option<PathBuf>,

    /// script to load before dispatch; may be repeated
    #[argh(option, short = 'i', long = "import")]
    import_scripts: Vec<String>,

    /// origin scoping cross-context messages (default: FARCALL_DOMAIN or http://localhost)
    #[argh(option, long = "domain")]
    domain: Option<String>,

    /// use the sandboxed frame transport instead of a worker thread
    #[argh(switch, long = "frame")]
    frame: bool,

    /// give up after this many milliseconds
    #[argh(option, long = "timeout-ms", default = "30000")]
    timeout_ms: u64,

    /// name of the definition to run
    #[argh(positional)]
    command: String,

    /// JSON array of positional arguments (default: [])
    #[argh(positional)]
    args: Option<String>,
}

impl CallArgs {
    fn bridge_args(&self) -> BridgeArgs {
        BridgeArgs {
            definitions: self.definitions.clone(),
            definitions_file: self.definitions_file.clone(),
            import_scripts: self.import_scripts.clone(),
            domain: self.domain.clone(),
            frame: self.frame,
        }
    }
}

#[derive(FromArgs)]
#[argh(subcommand, name = "bootstrap")]
/// print the bootstrap program for a set of definitions
struct BootstrapArgs {
    /// definition as key=source; may be repeated
    #[argh(option, short = 'd', long = "define")]
    definitions: Vec<String>,

    /// JSON file with definitions
    #[argh(option, long = "definitions")]
    definitions_file: Option<PathBuf>,

    /// script to load before dispatch; may be repeated
    #[argh(option, short = 'i', long = "import")]
    import_scripts: Vec<String>,

    /// origin scoping cross-context messages (default: FARCALL_DOMAIN or http://localhost)
    #[argh(option, long = "domain")]
    domain: Option<String>,

    /// generate the sandboxed frame variant
    #[argh(switch, long = "frame")]
    frame: bool,
}

impl BootstrapArgs {
    fn bridge_args(&self) -> BridgeArgs {
        BridgeArgs {
            definitions: self.definitions.clone(),
            definitions_file: self.definitions_file.clone(),
            import_scripts: self.import_scripts.clone(),
            domain: self.domain.clone(),
            frame: self.frame,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli: Cli = argh::from_env();

    // Logs go to stderr; `call` stays quiet unless RUST_LOG asks otherwise.
    let default_level = match cli.command {
        Commands::Call(_) => "warn",
        Commands::Bootstrap(_) => "info",
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Call(args) => run_call(args).await,
        Commands::Bootstrap(args) => {
            print!("{}", args.bridge_args().render_bootstrap()?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Executes the `call` subcommand.
///
/// Starts a bridge, runs one command and tears the bridge down. An uncaught
/// remote error (for example a failing import script) aborts the call.
async fn run_call(args: CallArgs) -> Result<ExitCode> {
    let options = args.bridge_args().to_options()?;
    let call_args = parse_call_args(args.args.as_deref())?;

    let bridge = Bridge::new(options);
    let mut exceptions = bridge.subscribe_exceptions();
    let kind = bridge.start()?;
    tracing::debug!(transport = %kind, command = %args.command, "bridge ready");

    let call = bridge.run(args.command.clone(), call_args);
    let timeout = Duration::from_millis(args.timeout_ms);

    let outcome = tokio::select! {
        result = tokio::time::timeout(timeout, call) => result
            .map_err(|_| anyhow!("'{}' did not complete within {}ms", args.command, args.timeout_ms)),
        Ok(uncaught) = exceptions.recv() => Err(anyhow!("Uncaught {}", uncaught)),
    };

    if let Err(e) = bridge.terminate() {
        tracing::debug!("terminate after call: {}", e);
    }

    match outcome? {
        Ok(value) => {
            println!("{}", serde_json::to_string(&value)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(FarcallError::Remote(err)) => {
            eprintln!("{}", err);
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e.into()),
    }
}
