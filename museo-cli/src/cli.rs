use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Define CLI arguments
#[derive(Parser, Debug)]
#[command(
    name = "museo",
    version,
    about = "Offline content cache for the museo audio guide",
    long_about = "Drives the museo cache engine against the network and an on-disk cache.\n\
                  \n\
                  Requests are classified as audio, image, data or app shell content and\n\
                  answered from class-specific stores before the network is tried. Stores\n\
                  can be warmed ahead of time, listed, reconciled against the current cache\n\
                  version, or cleared."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Directory holding the stores
    #[arg(
        long,
        global = true,
        default_value = "./museo-cache",
        help = "Directory where cache stores are kept"
    )]
    pub cache_dir: PathBuf,

    /// Origin the guide app is served from
    #[arg(
        long,
        global = true,
        default_value = "http://localhost:5173",
        help = "Origin of the guide application; relative URLs resolve against it"
    )]
    pub origin: String,

    /// External host serving audio and images
    #[arg(
        long,
        global = true,
        help = "Origin of the asset host whose audio and images are cached (default: https://accfree.nextaudioguides.com)"
    )]
    pub asset_origin: Option<String>,

    /// Prefix of language-scoped store names
    #[arg(long, global = true, default_value = "accademia")]
    pub app_name: String,

    /// Version of the class stores
    #[arg(long, global = true, default_value = "6")]
    pub cache_version: u32,

    /// Overall timeout in seconds
    #[arg(
        long,
        global = true,
        default_value = "30",
        help = "Overall timeout in seconds for HTTP requests (0 disables it)"
    )]
    pub timeout: u64,

    /// Connection timeout in seconds
    #[arg(
        long,
        global = true,
        default_value = "10",
        help = "Connection timeout in seconds (time to establish initial connection)"
    )]
    pub connect_timeout: u64,

    /// Custom HTTP headers
    #[arg(
        long = "header",
        short = 'H',
        global = true,
        help = "Add custom HTTP header to requests (can be used multiple times). Format: 'Name: Value'",
        value_name = "HEADER"
    )]
    pub headers: Vec<String>,

    /// Parallel fetches while warming
    #[arg(long, global = true, default_value = "4")]
    pub warm_concurrency: usize,

    /// Disable all proxy settings
    #[arg(long, global = true, help = "Do not use system proxy settings")]
    pub no_proxy: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true, help = "Enable detailed debug logging")]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run URLs through the cache pipeline
    Fetch {
        /// Absolute URLs, or paths relative to the app origin
        #[arg(required = true)]
        urls: Vec<String>,

        /// Byte range to request, e.g. "bytes=0-1023"
        #[arg(long)]
        range: Option<String>,

        /// Treat the requests as navigations
        #[arg(long)]
        navigate: bool,

        /// Pretend the device has no connectivity
        #[arg(long)]
        offline: bool,

        /// Write the body of the last response to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Fetch URLs into the matching stores ahead of time
    Warm {
        /// Absolute URLs, or paths relative to the app origin
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Delete every store
    Clear,

    /// List stores and their entry counts
    Stores,

    /// Delete stores that do not belong to the current cache version
    Reconcile,

    /// Precache the app shell and activate
    Install,
}
