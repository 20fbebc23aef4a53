use std::sync::Arc;

use anyhow::Context;
use futures::StreamExt;

use onboard_flow::cli::{self, Command};
use onboard_flow::config::WizardConfig;
use onboard_flow::lookup::{HttpMetadataProvider, MetadataProvider, SimulatedMetadataProvider};
use onboard_flow::onboarding::{
    OnboardingDeps, OnboardingEvent, OnboardingManager, OnboardingRouteState, onboarding_routes,
};
use onboard_flow::verification::{CodeIssuer, InMemoryCodeIssuer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = WizardConfig::from_env();
    config.validate().context("invalid onboarding configuration")?;

    let metadata: Arc<dyn MetadataProvider> = match &config.meta_endpoint {
        Some(endpoint) => Arc::new(HttpMetadataProvider::new(endpoint.clone())),
        None => Arc::new(SimulatedMetadataProvider::new()),
    };
    let issuer: Arc<dyn CodeIssuer> = Arc::new(InMemoryCodeIssuer::new());

    eprintln!("Onboard Flow v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Metadata: {}", metadata.name());
    eprintln!("   Status API: http://0.0.0.0:{}/api/onboarding/status", config.http_port);
    eprintln!("   Type 'help' for commands, 'quit' to exit.\n");

    let manager = Arc::new(OnboardingManager::new(
        &config,
        OnboardingDeps { issuer, metadata },
    ));

    // Spawn the status API
    let app = onboarding_routes(OnboardingRouteState {
        manager: Arc::clone(&manager),
    });
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.http_port))
        .await
        .with_context(|| format!("failed to bind status API port {}", config.http_port))?;
    tracing::info!(port = config.http_port, "Onboarding status API started");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Status API stopped: {}", e);
        }
    });

    // Log completion however it is reached (CLI or REST)
    let mut events = manager.subscribe();
    let completion_manager = Arc::clone(&manager);
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if event == OnboardingEvent::Completed {
                let summary = completion_manager.summary().await.unwrap_or_default();
                tracing::info!(%summary, "Onboarding completed");
                break;
            }
        }
    });

    let mut lines = cli::stdin_lines();
    eprint!("> ");
    while let Some(line) = lines.next().await {
        match cli::parse_command(&line) {
            Ok(Some(Command::Quit)) => break,
            Ok(Some(command)) => println!("{}", cli::execute(&manager, command).await),
            Ok(None) => {}
            Err(e) => println!("{e}"),
        }
        eprint!("> ");
    }

    manager.shutdown().await;
    tracing::info!(completed = manager.is_complete().await, "Onboarding session ended");
    Ok(())
}
