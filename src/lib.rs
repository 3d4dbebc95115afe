pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;
pub mod state;

pub use shared::{AppConfig, AppError};
pub use state::{AppState, StatePorts};

/// `RUST_LOG` が無ければクレートとオフライン系ターゲットを debug で出す
pub fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "selah_lib=debug,offline=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
