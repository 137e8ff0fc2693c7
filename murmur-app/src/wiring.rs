use anyhow::{Context, Result};
use murmur_config::MurmurConfig;
use murmur_harvest::{
    HarvestReport, HarvestSettings, Harvester, Pacing, RecordSink, authenticate,
};
use murmur_social::Credentials;
use murmur_social::twitter::{TwitterWebClient, TwitterWebConfig};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub fn client_config(cfg: &MurmurConfig) -> TwitterWebConfig {
    TwitterWebConfig {
        base_url: cfg.client.base_url.clone(),
        language: cfg.client.language.clone(),
        product: cfg.search.product.clone(),
        page_size: cfg.search.page_size,
        request_timeout: Duration::from_secs(cfg.client.request_timeout_secs),
    }
}

pub fn credentials(cfg: &MurmurConfig) -> Credentials {
    Credentials {
        username: cfg.credentials.username.clone(),
        email: cfg.credentials.email.clone(),
        password: cfg.credentials.password.clone(),
    }
}

pub fn harvest_settings(cfg: &MurmurConfig) -> HarvestSettings {
    let limits = &cfg.limits;
    HarvestSettings {
        query: cfg.search.query.clone(),
        minimum_records: cfg.search.minimum_records,
        max_inactivity: limits.max_inactivity,
        max_timeouts: limits.max_timeouts,
        timeout_backoff: Duration::from_secs(limits.timeout_backoff_secs),
        rate_limit_fallback: Duration::from_secs(limits.rate_limit_fallback_secs),
        pacing: Pacing::new(
            Duration::from_secs(limits.pacing.min_secs),
            Duration::from_secs(limits.pacing.max_secs),
        ),
    }
}

/// Authenticate, open the output files and harvest until a stop condition.
pub async fn run(cfg: MurmurConfig, cancel: CancellationToken) -> Result<HarvestReport> {
    let mut client = TwitterWebClient::new(client_config(&cfg)).context("building search client")?;

    let outcome = authenticate(&mut client, &credentials(&cfg), &cfg.output.token).await?;
    tracing::info!(?outcome, "session ready");

    let sink = RecordSink::open(&cfg.output.csv, &cfg.output.json)?;
    let report = Harvester::new(&client, harvest_settings(&cfg), sink, cancel)
        .run()
        .await?;
    Ok(report)
}
