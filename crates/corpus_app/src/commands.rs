use std::sync::Arc;

use anyhow::Context;
use chrono::SecondsFormat;
use corpus_engine::{
    ingest, load_ledger, provider_from_env, BatchWriter, BlobStoreFetcher, BlobStoreSettings,
    GraphQlClient, LedgerAppender, MetadataSource, Orchestrator, RunRequest, TransportSession,
};
use corpus_logging::{corpus_info, corpus_warn};

use crate::cli::{Cli, Command};
use crate::config::CollectorConfig;
use crate::logging;

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = CollectorConfig::load(&cli.config)?;
    logging::initialize(
        corpus_logging::level_for_verbosity(cli.verbose),
        Some(&config.output.data_dir),
    );

    match cli.command {
        Command::Collect { limit } => collect(&config, limit).await,
        Command::Count => count(&config).await,
        Command::Latest => latest(&config).await,
    }
}

fn metadata_client(config: &CollectorConfig, session: TransportSession) -> anyhow::Result<GraphQlClient> {
    let credentials = provider_from_env().context("metadata store credentials")?;
    let client = GraphQlClient::with_credentials(session, &config.endpoint, credentials.as_ref())?;
    Ok(client)
}

async fn count(config: &CollectorConfig) -> anyhow::Result<()> {
    let session = TransportSession::new(config.run.connection_limit)?;
    let client = metadata_client(config, session)?;
    let total = client
        .count(&config.query.document_type, &config.query.filter())
        .await
        .context("counting documents")?;
    println!("{total}");
    Ok(())
}

async fn latest(config: &CollectorConfig) -> anyhow::Result<()> {
    let session = TransportSession::new(config.run.connection_limit)?;
    let client = metadata_client(config, session)?;
    let updated = client
        .latest_update(&config.query.document_type, &config.query.filter())
        .await
        .context("querying latest update")?;
    println!("{}", updated.to_rfc3339_opts(SecondsFormat::Millis, true));
    Ok(())
}

async fn collect(config: &CollectorConfig, limit: Option<usize>) -> anyhow::Result<()> {
    let ledger_path = config.output.ledger_path();
    let ingested = load_ledger(&ledger_path)
        .with_context(|| format!("reading ledger {}", ledger_path.display()))?;
    corpus_info!(
        "Ledger {} lists {} ingested documents",
        ledger_path.display(),
        ingested.len()
    );

    let session = TransportSession::new(config.run.connection_limit)?;
    let client = metadata_client(config, session.clone())?;
    let access = config.storage.resolve(|name| std::env::var(name).ok())?;
    let blobs = BlobStoreFetcher::new(
        session,
        BlobStoreSettings {
            endpoint: access.endpoint,
            bucket: access.bucket,
            token: access.token,
            max_bytes: config.run.max_content_bytes,
        },
    );

    let orchestrator = Orchestrator::new(Arc::new(client), Arc::new(blobs), config.run.clone());
    let request = RunRequest {
        document_type: config.query.document_type.clone(),
        filter: config.query.filter(),
        fields: config.query.fields.clone(),
        limit: limit.or(config.query.limit),
    };

    corpus_info!("Saving data to: {}", config.output.data_dir.display());
    let appender = LedgerAppender::open(&ledger_path)?;
    let writer = Arc::new(BatchWriter::new(
        config.output.data_dir.clone(),
        appender,
        config.output.base_name.clone(),
    )?);

    let summary = ingest(orchestrator.run(request, Arc::new(ingested)), &writer).await?;
    for failed in &summary.failed {
        corpus_warn!("Not collected: {} ({}): {}", failed.id, failed.uri, failed.kind);
    }
    println!(
        "collected {} documents ({} tokens), {} failed",
        summary.written.len(),
        summary.tokens,
        summary.failed.len()
    );
    Ok(())
}
