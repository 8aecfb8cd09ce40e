use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use sanext::client::{ClientBuilder, ClientConfig, MemoryStateStore};

fn cli() -> Command {
    Command::new("sanext-poller")
        .about("Poll a Sanext heat meter and keep its readings up to date")
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_name("FILE")
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .value_name("HOST")
                .help("Meter or gateway host name"),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .value_name("PORT")
                .value_parser(clap::value_parser!(u16))
                .help("Meter or gateway TCP port"),
        )
        .arg(
            Arg::new("serial")
                .long("serial")
                .value_name("SERIAL")
                .help("Meter serial number (hex)"),
        )
        .arg(
            Arg::new("interval")
                .long("interval")
                .value_name("MS")
                .value_parser(clap::value_parser!(u64))
                .help("Delay between sweeps in milliseconds"),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .short('d')
                .help("Log every frame")
                .action(ArgAction::SetTrue),
        )
}

fn load_config(matches: &ArgMatches) -> Result<ClientConfig> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => ClientConfig::load(path).with_context(|| format!("Failed to load {}", path))?,
        None => ClientConfig::default(),
    };

    if let Some(host) = matches.get_one::<String>("host") {
        config.host = Some(host.clone());
    }
    if let Some(port) = matches.get_one::<u16>("port") {
        config.port = Some(*port);
    }
    if let Some(serial) = matches.get_one::<String>("serial") {
        config.device_serial_number = Some(serial.clone());
    }
    if let Some(interval) = matches.get_one::<u64>("interval") {
        config.polling_interval_ms = Some(*interval);
    }
    Ok(config)
}

/// Resolve on Ctrl-C, or on SIGTERM where available
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut term = match signal(SignalKind::terminate()) {
            Ok(sig) => Some(sig),
            Err(e) => {
                log::warn!("Failed to install SIGTERM handler: {}", e);
                None
            }
        };

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    log::error!("Failed to listen for Ctrl-C: {}", e);
                }
            }
            _ = async {
                match term.as_mut() {
                    Some(sig) => {
                        sig.recv().await;
                    }
                    None => std::future::pending::<()>().await,
                }
            } => {}
        }
    }
    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C: {}", e);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if matches.get_flag("debug") {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    let config = load_config(&matches)?;
    if let Err(e) = config.validate() {
        log::error!("Invalid configuration, not polling: {}", e);
        return Err(e.into());
    }

    let client = ClientBuilder::from_config(&config).build(MemoryStateStore::new())?;
    let handle = client.start();

    wait_for_signal().await;
    log::info!("Shutting down");

    if let Some(stats) = handle.stop().await {
        log::info!(
            "Final statistics: {} (success rate {:.1}%)",
            stats,
            stats.success_rate()
        );
    }
    Ok(())
}
