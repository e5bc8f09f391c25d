pub mod agent_engine;
pub mod backend;
pub mod config;
pub mod errors;
pub mod executor;
pub mod llm;
pub mod perception;

/// Install the global fmt subscriber. `RUST_LOG` wins over the default filter.
pub fn init_tracing(verbose: bool) {
    let default = if verbose { "touchpilot=debug" } else { "touchpilot=info" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_target(false)
        .try_init();
}
