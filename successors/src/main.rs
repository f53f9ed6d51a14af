use clap::error::ErrorKind;
use clap::Parser;
use log::warn;
use successors::cli::{Args, USAGE};
use successors::engine::rizin::RzEngine;
use successors::{ExecutionController, PathSet, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_logging(level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            if e.kind() != ErrorKind::MissingRequiredArgument {
                eprintln!("{}", e);
            }
            println!("{}", USAGE);
            std::process::exit(0);
        }
    };
    init_logging(&args.log_level);

    println!(
        "Running with program={} address={}",
        args.program.display(),
        args.address
    );
    let config = args.config();
    let z3_cfg = z3::Config::new();
    let z3_ctx = z3::Context::new(&z3_cfg);
    let engine = RzEngine::new(&args.program.to_string_lossy(), &z3_ctx, config.limits)?;
    let controller = ExecutionController::new(engine, config);

    match &args.paths {
        None => {
            let report = controller.execute(args.address)?;
            println!("Run finished");
            println!("{}", report);
        }
        Some(file) => {
            let paths = PathSet::load(file)?;
            for path in paths.iter() {
                if path.last_address() != args.address {
                    warn!(
                        "path {} ends at {}, not at {}",
                        path.id(),
                        path.last_address(),
                        args.address
                    );
                }
            }
            for line in paths.describe() {
                println!("{}", line);
            }
            let report = controller.execute_directed(paths)?;
            println!("Run finished");
            print!("{}", report);
        }
    }
    Ok(())
}
