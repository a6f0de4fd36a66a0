use tracing::Span;

/// Hands out spans named after modules and services
///
/// Events recorded inside a span carry its `logger` field, which takes the place of a per-class
/// logger name.
#[derive(Debug, Default)]
pub struct LoggerSource;

impl LoggerSource {
    pub fn new() -> Self {
        LoggerSource
    }

    pub fn logger(&self, name: &str) -> Span {
        tracing::info_span!("logger", logger = %name)
    }

    pub fn service_logger(&self, module: &str, service_id: &str) -> Span {
        tracing::info_span!("service", logger = %module, service = %service_id)
    }
}
