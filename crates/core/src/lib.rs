// Playback sessions for Podium
//
// A session wraps one native media engine instance, reports playback position
// on a fixed cadence and applies a finish policy at end-of-media. Sessions are
// addressed by player key through a `SessionRegistry`.

pub mod callback;
pub mod completion;
pub mod config;
pub mod engine;
pub mod error;
pub mod registry;
pub mod session;
pub mod state;
pub mod ticker;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use callback::{EventDispatcher, EventSink, SessionEvent};
pub use completion::{completion, Completer, Pending};
pub use config::{PrepareOptions, SessionConfig};
pub use engine::{EngineFactory, EngineListener, MediaEngine};
pub use error::{AudioError, Result};
pub use registry::SessionRegistry;
pub use session::PlaybackSession;
pub use state::{DurationKind, EngineState, FinishMode, PlayerKey, SessionStatus};

use std::sync::Once;

static INIT_LOGGER: Once = Once::new();

/// Install the platform logger once; later calls are no-ops
pub fn init_logging() {
    INIT_LOGGER.call_once(|| {
        #[cfg(target_os = "android")]
        {
            android_logger::init_once(
                android_logger::Config::default()
                    .with_max_level(log::LevelFilter::Debug)
                    .with_tag("PodiumSession"),
            );
        }

        #[cfg(not(target_os = "android"))]
        {
            // Another logger may already be installed by the host
            let _ = env_logger::builder()
                .is_test(false)
                .filter_level(log::LevelFilter::Info)
                .parse_default_env()
                .try_init();
        }
    });
}
