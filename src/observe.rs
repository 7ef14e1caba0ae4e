// Failure sink injected into the sampler and the store
use crate::error::RatesError;
use log::warn;

/// Receives every failure a component swallows or converts before returning.
pub trait FailureSink: Send + Sync {
    fn on_failure(&self, operation: &str, error: &RatesError);
}

/// Default sink: forwards to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl FailureSink for LogSink {
    fn on_failure(&self, operation: &str, error: &RatesError) {
        warn!("{} failed: {}", operation, error);
    }
}
