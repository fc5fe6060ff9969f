pub mod config;
pub mod conversation;
pub mod inference;
pub mod moderation;
pub mod orchestrator;
pub mod pipeline;
pub mod server;
pub mod streaming;
pub mod tools;

#[cfg(test)]
mod test_support;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use config::AppConfig;
use inference::{CompletionModel, InferenceClient};
use moderation::{ModerationGate, OpenAiModerationClient};
use orchestrator::Orchestrator;
use pipeline::ChatPipeline;
use server::AppState;
use tools::exa::ExaClient;
use tools::pinecone::PineconeIndex;
use tools::{ReviewSearchTool, Toolbox, WebSearchTool, TOOL_SCHEMA_VERSION};

/// Format switch for log output: `json` or anything else for plain text.
pub const LOG_FORMAT_ENV: &str = "SELLERSIGHT_LOG_FORMAT";

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the default `sellersight=info,warn` filter.
pub fn init_tracing() {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sellersight=info,warn"));

    let json = std::env::var(LOG_FORMAT_ENV).is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        fmt::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_current_span(true)
            .init();
    } else {
        fmt::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .init();
    }
}

/// Wire every component from `config` into shared server state.
pub async fn build_state(config: &AppConfig) -> anyhow::Result<Arc<AppState>> {
    let model: Arc<dyn CompletionModel> = Arc::new(
        InferenceClient::from_config(&config.completion)
            .context("failed to build completion client")?,
    );

    let classifier = OpenAiModerationClient::from_config(
        &config.moderation,
        &config.completion.api_key,
    )
    .context("failed to build moderation client")?;
    let gate = ModerationGate::new(Arc::new(classifier), config.moderation.fail_open);

    let index = PineconeIndex::connect(&config.review_index, &config.completion)
        .await
        .context("failed to connect to the review index")?;
    let exa = Arc::new(
        ExaClient::from_config(&config.web_search).context("failed to build web search client")?,
    );

    let toolbox = Arc::new(Toolbox::new(
        ReviewSearchTool::new(
            Arc::new(index),
            config.review_index.default_top_k,
            config.review_index.min_score,
        ),
        WebSearchTool::new(exa.clone(), config.web_search.default_num_results),
    ));

    let orchestration = &config.orchestration;
    let pipeline = ChatPipeline::new(
        gate,
        Orchestrator::new(model, toolbox, orchestration),
        Duration::from_secs(orchestration.request_timeout_secs),
        orchestration.event_buffer,
    );

    Ok(Arc::new(AppState {
        pipeline: Arc::new(pipeline),
        web_search: exa,
    }))
}

/// Load configuration, connect the providers and serve HTTP until ctrl-c.
pub async fn run() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load().context("invalid configuration")?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_addr = %config.server.bind_addr,
        model = %config.completion.model,
        tool_schema_version = TOOL_SCHEMA_VERSION,
        step_budget = config.orchestration.step_budget,
        "=== SellerSight starting ==="
    );

    let state = build_state(&config).await?;
    let router = server::build_router(state, config.server.cors_permissive);

    let listener = tokio::net::TcpListener::bind(config.server.bind_addr.as_str())
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind_addr))?;
    tracing::info!(addr = %config.server.bind_addr, "listening");

    server::serve(listener, router)
        .await
        .context("server error")?;
    tracing::info!("server stopped");
    Ok(())
}
