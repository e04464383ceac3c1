use clap::{App, Arg, ArgMatches};
use log::info;
use puzzle_scores_server::server::{ServerConfig, ServerNode, StoreBackend};
use std::error::Error;
use std::net::IpAddr;
use url::Url;

fn setup_logger(level: log::LevelFilter, log_file: Option<&str>) -> Result<(), fern::InitError> {
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}][{}] {}",
                chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(level)
        .level_for("hyper", log::LevelFilter::Warn)
        .chain(std::io::stdout());
    if let Some(path) = log_file {
        dispatch = dispatch.chain(fern::log_file(path)?);
    }
    dispatch.apply()?;
    Ok(())
}

/// Flag value, else the environment variable, else `default`.
fn setting(matches: &ArgMatches, name: &str, env: &str, default: &str) -> String {
    matches
        .value_of(name)
        .map(String::from)
        .or_else(|| std::env::var(env).ok())
        .unwrap_or_else(|| String::from(default))
}

fn build_config(matches: &ArgMatches) -> Result<ServerConfig, Box<dyn Error>> {
    let port = setting(matches, "port", "PORT", "5000");
    let port = port
        .parse::<u16>()
        .map_err(|e| format!("invalid port {:?}: {}", port, e))?;
    let address = setting(matches, "address", "ADDRESS", "0.0.0.0");
    let address = address
        .parse::<IpAddr>()
        .map_err(|e| format!("invalid address {:?}: {}", address, e))?;
    let backend = if matches.is_present("use_memory_store") {
        StoreBackend::Memory
    } else {
        let url = setting(matches, "store_url", "SCORES_STORE_URL", "redis://127.0.0.1:6379");
        StoreBackend::Redis {
            url: Url::parse(&url).map_err(|e| format!("invalid store url: {}", e))?,
            key: setting(matches, "store_key", "SCORES_STORE_KEY", "puzzle:highscores"),
        }
    };
    Ok(ServerConfig {
        address,
        port,
        backend,
    })
}

#[rocket::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let matches = App::new("puzzle-scores-server")
        .version("0.1")
        .about("Records the fewest-moves score per level and puzzle image")
        .arg(
            Arg::new("port")
                .long("port")
                .takes_value(true)
                .help("HTTP port [env: PORT, default: 5000]"),
        )
        .arg(
            Arg::new("address")
                .long("address")
                .takes_value(true)
                .help("HTTP bind address [env: ADDRESS, default: 0.0.0.0]"),
        )
        .arg(
            Arg::new("store_url")
                .long("store-url")
                .takes_value(true)
                .help("Redis connection url [env: SCORES_STORE_URL]"),
        )
        .arg(
            Arg::new("store_key")
                .long("store-key")
                .takes_value(true)
                .help("Redis key holding the score document [env: SCORES_STORE_KEY]"),
        )
        .arg(
            Arg::new("use_memory_store")
                .long("use-memory-store")
                .conflicts_with_all(&["store_url", "store_key"])
                .help("Keep scores in process memory instead of redis"),
        )
        .arg(
            Arg::new("log_file")
                .long("log-file")
                .takes_value(true)
                .help("Also append logs to this file [env: SCORES_LOG_FILE]"),
        )
        .arg(
            Arg::new("log_level")
                .long("log-level")
                .takes_value(true)
                .possible_values(["error", "warn", "info", "debug", "trace"])
                .help("Log verbosity [env: SCORES_LOG_LEVEL, default: info]"),
        )
        .get_matches();

    let level = setting(&matches, "log_level", "SCORES_LOG_LEVEL", "info")
        .parse::<log::LevelFilter>()
        .map_err(|e| format!("invalid log level: {}", e))?;
    let log_file = matches
        .value_of("log_file")
        .map(String::from)
        .or_else(|| std::env::var("SCORES_LOG_FILE").ok());
    setup_logger(level, log_file.as_deref())?;

    let config = build_config(&matches)?;
    info!("Server running on {}:{}", config.address, config.port);
    let server_node = ServerNode::new(config).await?;
    let _ = server_node.build().launch().await?;
    Ok(())
}
