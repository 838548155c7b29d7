use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Tracing {
    /// Plain log output
    #[default]
    Disabled,
    /// Structured (bunyan JSON) output, including spans
    Structured,
}

impl From<bool> for Tracing {
    fn from(enable: bool) -> Self {
        if enable {
            Tracing::Structured
        } else {
            Tracing::Disabled
        }
    }
}

/// Set up logging for the process.
///
/// Filtering is controlled through `RUST_LOG`. Calling this more than once only reports an error.
pub fn init_tracing(name: &str, tracing: Tracing) {
    match tracing {
        Tracing::Disabled => {
            init_no_tracing();
        }
        Tracing::Structured => {
            init_structured(name);
        }
    }
}

fn init_structured(name: &str) {
    use tracing_subscriber::prelude::*;

    let formatting_layer = BunyanFormattingLayer::new(name.to_string(), std::io::stdout);

    if let Err(e) = tracing_subscriber::Registry::default()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(JsonStorageLayer)
        .with(formatting_layer)
        .try_init()
    {
        eprintln!("Error initializing tracing: {:?}", e);
    }
}

fn init_no_tracing() {
    if let Err(e) = env_logger::builder().format_timestamp_millis().try_init() {
        eprintln!("Error initializing logging: {:?}", e);
    }
}
