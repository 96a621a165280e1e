use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tweeter::error::Result;
use tweeter::persist;
use tweeter::server;
use tweeter::settings::Settings;
use tweeter::shell::Shell;
use tweeter::store::TweetStore;

fn main() -> ExitCode {
    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log));
    // logs go to stderr so they do not interleave with the shell on stdout
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();
    match run(settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "tweeter stopped");
            ExitCode::FAILURE
        }
    }
}

fn run(settings: Settings) -> Result<()> {
    let mode = settings.persistence_mode()?;
    let sink = persist::open(&mode)?;
    info!(?mode, "persistence ready");
    // the one store of this process, handed to each adapter explicitly
    let store = Arc::new(TweetStore::restore(Arc::clone(&sink))?.with_search_buffer(settings.search.buffer));

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    if settings.server.enabled {
        let bind = settings.bind_address()?;
        let api_store = Arc::clone(&store);
        if settings.shell {
            runtime.spawn(async move {
                if let Err(e) = server::serve(api_store, bind).await {
                    error!(error = %e, "http api stopped");
                }
            });
        } else {
            runtime.block_on(server::serve(api_store, bind))?;
        }
    }
    if settings.shell {
        let stdin = io::stdin();
        let mut shell = Shell::new(&store, stdin.lock(), io::stdout());
        shell.run()?;
    }
    runtime.shutdown_background();
    sink.flush();
    Ok(())
}
