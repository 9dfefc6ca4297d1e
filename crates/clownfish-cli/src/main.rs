use std::time::Duration;

use clap::Parser;
use clap_verbosity_flag::Verbosity;
use clownfish::Config;

mod commands;
mod error;

use commands::{echo::handle_echo, hello::handle_hello, throw::handle_throw, trap::handle_trap};

#[derive(Parser, Debug)]
#[command(name = "cfish")]
#[command(about = "Drive the Clownfish native object system from the host side", long_about = None)]
struct Args {
    #[command(flatten)]
    verbose: Verbosity,

    /// Drain deferred releases on a background thread every MS milliseconds
    #[arg(long, value_name = "MS", global = true)]
    finalizer_ms: Option<u64>,

    /// Exit status used when an error is thrown outside any trap
    #[arg(long, value_name = "CODE", default_value_t = 1, global = true)]
    uncaught_exit_code: i32,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Build a greeting out of native strings
    Hello {
        /// Who to greet
        #[arg(default_value = "world")]
        name: String,
    },

    /// Throw an error under a trap and report it
    Trap {
        /// Message carried by the error
        message: String,
        /// Trap through the native entry point instead of the host one
        #[arg(short, long)]
        native: bool,
    },

    /// Print the arguments as a native vector
    Echo {
        /// Values to collect
        #[arg(value_name = "TEXT")]
        args: Vec<String>,
        /// Treat each value as hex-encoded bytes
        #[arg(long)]
        hex: bool,
    },

    /// Throw an error with no trap in place
    Throw {
        /// Message carried by the error
        message: String,
    },
}

fn main() -> miette::Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.verbose.log_level_filter())
        .init();

    let mut config = Config::default().with_uncaught_exit_code(args.uncaught_exit_code);
    if let Some(ms) = args.finalizer_ms {
        config = config.with_finalizer(Duration::from_millis(ms));
    }
    let parcel = clownfish::bootstrap_with(config);
    log::debug!("Bootstrapped (finalizer running: {})", parcel.has_finalizer());

    match args.command {
        Command::Hello { name } => handle_hello(&name)?,
        Command::Trap { message, native } => handle_trap(&message, native)?,
        Command::Echo { args, hex } => handle_echo(&args, hex)?,
        Command::Throw { message } => handle_throw(&message),
    }
    Ok(())
}
