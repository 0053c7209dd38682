use clap::Args;
use c2station_core::{
    data_dir, Config, Console, ConsoleInput, ConsoleLock, ConsoleOptions, Stores,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use super::ApiArgs;

#[derive(Args)]
pub struct RunArgs {
    #[command(flatten)]
    api: ApiArgs,
}

/// Log in, start the console and read one JSON object per stdin line: a
/// device signal, or an operator command tagged with `command` (`schedule`,
/// `cancel`). Every event is echoed to stdout as a JSON line. Stops on EOF
/// or Ctrl-C.
///
/// The data directory is locked for the lifetime of the run so offline
/// `schedule` edits cannot be overwritten by the console's own saves.
pub fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    config.validate()?;
    let dir = data_dir()?;
    let lock = ConsoleLock::acquire(&dir)?;
    info!(lock = %lock.path().display(), "data directory locked");
    let rt = super::runtime()?;

    let result = rt.block_on(async {
        let gateway = super::connect(&config, &args.api).await?;
        let console = Console::start(
            gateway.clone(),
            Stores::in_dir(&dir),
            ConsoleOptions::from_config(&config),
        )?;

        let mut events = console.subscribe();
        let printer = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => match serde_json::to_string(&event) {
                        Ok(line) => println!("{line}"),
                        Err(e) => warn!(error = %e, "could not encode event"),
                    },
                    Err(RecvError::Lagged(skipped)) => warn!(skipped, "event printer fell behind"),
                    Err(RecvError::Closed) => break,
                }
            }
        });

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            tokio::select! {
                line = lines.next_line() => match line? {
                    Some(line) if line.trim().is_empty() => {}
                    Some(line) => match ConsoleInput::parse_line(&line) {
                        Ok(ConsoleInput::Signal(signal)) => console.ingest(signal),
                        // Refusals are published as events.
                        Ok(ConsoleInput::Command(command)) => {
                            let _ = console.handle(command);
                        }
                        Err(e) => warn!(error = %e, "skipping malformed input line"),
                    },
                    None => {
                        info!("stdin closed");
                        break;
                    }
                },
                _ = tokio::signal::ctrl_c() => {
                    info!("interrupted");
                    break;
                }
            }
        }

        console.shutdown();
        printer.abort();
        let _ = gateway.logout().await;
        Ok::<(), Box<dyn std::error::Error>>(())
    });
    drop(lock);
    result
}
