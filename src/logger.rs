use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `RUST_LOG` overrides the default `info`
/// filter; `json` switches to one JSON object per event.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,reqwest=warn"));

    let builder = tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_env_filter(filter);

    if json {
        builder.json().with_current_span(false).init();
    } else {
        builder.compact().init();
    }
}
