use slog::Logger;
use vendor::prelude::discard_logger;

/// The three log sinks of a client. Unset sinks discard.
/// * **error**: nodes marked dead or resurrected, failed requests and
/// failed sniff or health cycles.
/// * **info**: one record per executed request, nodes joining, lifecycle.
/// * **trace**: request and response dumps.
#[derive(Clone)]
pub struct LogSinks {
    pub error: Logger,
    pub info: Logger,
    pub trace: Logger,
}

impl Default for LogSinks {
    fn default() -> Self {
        Self {
            error: discard_logger(),
            info: discard_logger(),
            trace: discard_logger(),
        }
    }
}

impl std::fmt::Debug for LogSinks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSinks").finish_non_exhaustive()
    }
}
