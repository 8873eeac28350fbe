use std::sync::Arc;

use ai_client::{Claude, OpenAi, TextCompletion};
use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cerebro_client::CerebroClient;
use chorus_agent::timeline_sync::{TimelineSync, XTimeline};
use chorus_common::{Config, LlmProvider, Persona};
use chorus_subscription::{
    PgLedger, SubscriptionClient, SubscriptionConfig, SubscriptionDeps, XPlatform,
};
use x_client::XClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("chorus=info".parse()?))
        .init();

    info!("Chorus agent starting...");

    let config = Config::from_env()?;
    config.log_redacted();

    let persona = Persona::from_file(&config.character_path)
        .with_context(|| format!("Failed to load character {}", config.character_path.display()))?;
    info!(name = %persona.name, agent_id = %persona.agent_id(), topics = persona.topics.len(), "Loaded persona");

    // Resolve the account we act as
    let x = XClient::new(config.x_access_token.clone());
    let agent = XPlatform::resolve_agent(&x, &config.x_username)
        .await
        .with_context(|| format!("Failed to resolve X account @{}", config.x_username))?;
    info!(user_id = %agent.id, username = %agent.username, "X session initialized");

    let completion: Arc<dyn TextCompletion> = match config.llm_provider {
        LlmProvider::Anthropic => Arc::new(Claude::new(&config.llm_api_key, &config.llm_model)),
        LlmProvider::OpenAi => Arc::new(OpenAi::new(&config.llm_api_key, &config.llm_model)),
    };

    let ledger = PgLedger::connect(&config.database_url).await?;
    ledger.migrate().await?;

    let deps = SubscriptionDeps::builder()
        .platform(Arc::new(XPlatform::new(x.clone(), agent.clone())))
        .ledger(Arc::new(ledger))
        .completion(completion)
        .persona(persona)
        .agent(agent.clone())
        .build();
    let client = Arc::new(SubscriptionClient::new(deps, SubscriptionConfig::from(&config)));
    let subscription = client.start();

    // Hourly timeline upload, only with Cerebro configured
    let cancel = CancellationToken::new();
    let sync_task = config.cerebro.as_ref().map(|cerebro| {
        let sync = TimelineSync::new(
            Arc::new(XTimeline::new(x.clone(), agent.id.clone())),
            Arc::new(CerebroClient::new(&cerebro.base_url, &cerebro.api_key)),
            agent.username.clone(),
        );
        let cancel = cancel.clone();
        info!("Cerebro timeline sync scheduled");
        tokio::spawn(async move { sync.run(cancel).await })
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested, finishing the current iteration");
    client.stop();
    cancel.cancel();

    if let Some(handle) = subscription {
        tokio::select! {
            joined = handle => {
                if let Err(e) = joined {
                    warn!(error = %e, "Subscription task ended abnormally");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("Second interrupt, exiting without waiting");
                return Ok(());
            }
        }
    }

    if let Some(handle) = sync_task {
        match handle.await {
            Ok(Err(e)) => warn!(error = %e, "Timeline sync ended with error"),
            Err(e) => warn!(error = %e, "Timeline sync task ended abnormally"),
            Ok(Ok(())) => {}
        }
    }

    info!("Chorus agent stopped");
    Ok(())
}
