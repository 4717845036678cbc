use std::path::PathBuf;

use argh::FromArgs;

#[derive(Debug, Clone, FromArgs)]
#[argh(description = "Watches Binance Chain for transfers to the THORChain pools")]
pub(crate) struct Args {
    #[argh(switch, description = "show the version and exit")]
    pub version: bool,

    #[argh(
        option,
        short = 'l',
        default = "String::from(\"info\")",
        description = "log level (default: info)"
    )]
    pub log_level: String,

    #[argh(switch, short = 'p', description = "human readable multi-line logs")]
    pub pretty_log: bool,

    #[argh(
        option,
        short = 'c',
        default = "PathBuf::from(\"config.toml\")",
        description = "path to the TOML configuration (default: config.toml)"
    )]
    pub cfg: PathBuf,
}
