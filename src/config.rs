use std::time::Duration;

use clap::{Arg, ArgAction, ArgMatches, Command};



pub const DEFAULT_MONGO_URI: &str = "mongodb://localhost:27017/livestream_app";

#[derive(Clone)]
#[derive(Debug, PartialEq, Eq)]
pub struct Config {
	pub mongo_uri: String,
	/// Overrides the database named in `mongo_uri`.
	pub database: Option<String>,
	pub memory_store: bool,
	pub probe_timeout: Duration,
	pub address: String,
	pub port: u16,
}

pub fn command() -> Command {
	Command::new("stream-overlay-mgr")
		.version(env!("CARGO_PKG_VERSION"))
		.about("Overlay and RTSP stream manager for live video.")
		.arg(
			Arg::new("mongo-uri")
				.long("mongo-uri")
				.env("MONGO_URI")
				.default_value(DEFAULT_MONGO_URI)
				.help("MongoDB connection string")
		)
		.arg(
			Arg::new("database")
				.long("database")
				.env("MONGO_DATABASE")
				.help("Database name, if not the one in the connection string")
		)
		.arg(
			Arg::new("memory-store")
				.long("memory-store")
				.env("OVERLAY_MEMORY_STORE")
				.action(ArgAction::SetTrue)
				.help("Keep everything in memory instead of MongoDB")
		)
		.arg(
			Arg::new("probe-timeout")
				.long("probe-timeout")
				.env("RTSP_PROBE_TIMEOUT_MS")
				.value_parser(clap::value_parser!(u64))
				.default_value("5000")
				.help("Timeout in milliseconds for RTSP connect and handshake")
		)
		.arg(
			Arg::new("address")
				.long("address")
				.env("ADDRESS")
				.default_value("0.0.0.0")
				.help("Address to listen on")
		)
		.arg(
			Arg::new("port")
				.short('p')
				.long("port")
				.env("PORT")
				.value_parser(clap::value_parser!(u16))
				.default_value("5000")
				.help("Port to listen on")
		)
}

impl Config {
	pub fn from_matches(matches: &ArgMatches) -> Config {
		Config {
			mongo_uri: matches.get_one::<String>("mongo-uri").cloned().unwrap_or_else(|| DEFAULT_MONGO_URI.to_string()),
			database: matches.get_one::<String>("database").cloned(),
			memory_store: matches.get_flag("memory-store"),
			probe_timeout: Duration::from_millis(matches.get_one::<u64>("probe-timeout").copied().unwrap_or(5000)),
			address: matches.get_one::<String>("address").cloned().unwrap_or_else(|| "0.0.0.0".to_string()),
			port: matches.get_one::<u16>("port").copied().unwrap_or(5000),
		}
	}
}



#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn flags_override_defaults() {
		let matches = command()
			.try_get_matches_from([
				"stream-overlay-mgr",
				"--mongo-uri", "mongodb://db:27017/overlays",
				"--memory-store",
				"--probe-timeout", "250",
				"-p", "8080",
			])
			.unwrap();
		let config = Config::from_matches(&matches);
		assert_eq!(config.mongo_uri, "mongodb://db:27017/overlays");
		assert!(config.memory_store);
		assert_eq!(config.probe_timeout, Duration::from_millis(250));
		assert_eq!(config.port, 8080);
	}

	#[test]
	fn rejects_bad_port() {
		assert!(command().try_get_matches_from(["stream-overlay-mgr", "--port", "http"]).is_err());
	}
}
