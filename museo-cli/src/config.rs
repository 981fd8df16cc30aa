use std::time::Duration;

use museo_engine::EngineConfig;
use tracing::info;
use url::Url;

use crate::cli::CliArgs;
use crate::error::AppError;
use crate::utils::parse_headers;

fn parse_origin(name: &str, value: &str) -> Result<Url, AppError> {
    let url = Url::parse(value)
        .map_err(|e| AppError::InvalidInput(format!("{name} '{value}': {e}")))?;
    if url.host_str().is_none() {
        return Err(AppError::InvalidInput(format!("{name} '{value}' has no host")));
    }
    Ok(url)
}

/// Build the engine configuration from the command line
pub fn engine_config(args: &CliArgs) -> Result<EngineConfig, AppError> {
    let origin = parse_origin("origin", &args.origin)?;

    let mut builder = EngineConfig::builder()
        .with_app_name(&args.app_name)
        .with_app_origin(origin)
        .with_cache_version(args.cache_version)
        .with_disk_cache(&args.cache_dir)
        .with_timeout(Duration::from_secs(args.timeout))
        .with_connect_timeout(Duration::from_secs(args.connect_timeout))
        .with_warm_concurrency(args.warm_concurrency)
        .with_system_proxy(!args.no_proxy);

    if let Some(asset_origin) = &args.asset_origin {
        builder = builder.with_asset_origin(&parse_origin("asset origin", asset_origin)?);
    }

    let headers = parse_headers(&args.headers);
    for (name, value) in &headers {
        if let Ok(value) = value.to_str() {
            builder = builder.with_header(name.as_str(), value);
        }
    }

    let config = builder.build()?;
    info!(
        cache_dir = %args.cache_dir.display(),
        origin = %config.app_origin,
        version = config.cache_version,
        timeout = args.timeout,
        connect_timeout = args.connect_timeout,
        "Engine configuration"
    );
    Ok(config)
}
