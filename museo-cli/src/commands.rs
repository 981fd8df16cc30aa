use std::path::Path;

use museo_engine::{
    ControlMessage, ControlOutcome, Engine, Interception, RequestDescriptor, RequestMode, Response,
    ServedFrom,
};
use tracing::{info, warn};

use crate::error::AppError;
use crate::utils::format_bytes;

pub struct CommandExecutor {
    engine: Engine,
}

impl CommandExecutor {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    fn request_for(&self, url: &str) -> Result<RequestDescriptor, AppError> {
        let url = self
            .engine
            .config()
            .resolve_url(url)
            .map_err(|e| AppError::InvalidInput(format!("{url}: {e}")))?;
        Ok(RequestDescriptor::get(url))
    }

    pub async fn fetch(
        &self,
        urls: &[String],
        range: Option<&str>,
        navigate: bool,
        offline: bool,
        output: Option<&Path>,
    ) -> Result<(), AppError> {
        // Stores on disk belong to a generation activated by an earlier run.
        self.engine.resume();
        if offline {
            self.engine.set_online(false);
        }

        let mut last_body = None;
        for url in urls {
            let mut request = self.request_for(url)?;
            if let Some(range) = range {
                request = request.with_range(range);
            }
            if navigate {
                request = request.with_mode(RequestMode::Navigate);
            }

            let shown = request.url().to_string();
            match self.engine.handle(request).await {
                Interception::Passthrough => {
                    println!("{shown}  not intercepted");
                }
                Interception::Forwarded(Err(e)) => {
                    println!("{shown}  forwarded, failed: {e}");
                }
                Interception::Served(response) | Interception::Forwarded(Ok(response)) => {
                    print_response(&shown, &response);
                    last_body = Some(response.body);
                }
            }
        }

        // Background refreshes must land before the process exits.
        self.engine.wait_background().await;

        if let Some(path) = output {
            match last_body {
                Some(body) => {
                    tokio::fs::write(path, &body).await?;
                    info!(path = %path.display(), size = body.len(), "Wrote response body");
                }
                None => warn!(path = %path.display(), "No response body to write"),
            }
        }
        Ok(())
    }

    pub async fn warm(&self, urls: &[String]) -> Result<(), AppError> {
        let outcome = self
            .engine
            .handle_message(ControlMessage::WarmCache {
                urls: urls.to_vec(),
            })
            .await?;

        if let ControlOutcome::Warmed(report) = outcome {
            for url in &report.cached {
                println!("cached  {url}");
            }
            for url in &report.skipped {
                println!("skipped {url}");
            }
            for url in &report.failed {
                println!("failed  {url}");
            }
            println!(
                "{} cached, {} skipped, {} failed",
                report.cached.len(),
                report.skipped.len(),
                report.failed.len()
            );
        }
        Ok(())
    }

    pub async fn clear(&self) -> Result<(), AppError> {
        if let ControlOutcome::Cleared(deleted) =
            self.engine.handle_message(ControlMessage::ClearAll).await?
        {
            for name in &deleted {
                println!("deleted  {name}");
            }
            println!("{} stores deleted", deleted.len());
        }
        Ok(())
    }

    pub async fn stores(&self) -> Result<(), AppError> {
        let registry = self.engine.registry();
        let current = self.engine.config().current_store_names();

        let names = registry.list_names().await?;
        if names.is_empty() {
            println!("no stores");
            return Ok(());
        }

        for name in names {
            let entries = registry.open(&name).await?.keys().await?.len();
            let marker = if current.contains(&name) { "*" } else { " " };
            println!("{marker} {name:<32} {entries:>6} entries");
        }
        Ok(())
    }

    pub async fn reconcile(&self) -> Result<(), AppError> {
        let deleted = self.engine.activate().await?;
        for name in &deleted {
            println!("deleted  {name}");
        }
        println!("{} outdated stores deleted", deleted.len());
        Ok(())
    }

    pub async fn install(&self) -> Result<(), AppError> {
        let state = self.engine.install().await?;
        println!("worker {state}");
        Ok(())
    }
}

fn print_response(url: &str, response: &Response) {
    let source = match &response.served_from {
        ServedFrom::Cache(store) => format!("cache:{store}"),
        ServedFrom::Network => "network".to_string(),
        ServedFrom::Fallback => "fallback".to_string(),
    };
    println!(
        "{url}  {}  {}  {}  {source}",
        response.status.as_u16(),
        response.content_type().unwrap_or("-"),
        format_bytes(response.body.len() as u64),
    );
}
