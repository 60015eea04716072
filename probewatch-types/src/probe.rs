//! Probe names.

/// Separator between the host, service and metric parts of a probe name.
pub const DEFAULT_SEPARATOR: &str = "[SEP]";

/// A probe name split into its parts.
///
/// Full names look like `host[SEP]service[SEP]metric`; shorter names are
/// allowed and simply leave the trailing parts empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProbeName {
    pub host: String,
    pub service: Option<String>,
    pub metric: Option<String>,
}

impl ProbeName {
    /// Split `name` on `separator`.
    pub fn parse(name: &str, separator: &str) -> Self {
        let split: Vec<&str> = if separator.is_empty() {
            vec![name]
        } else {
            name.splitn(3, separator).collect()
        };
        let mut parts = split.into_iter().map(str::to_string);

        Self {
            host: parts.next().unwrap_or_default(),
            service: parts.next(),
            metric: parts.next(),
        }
    }

    /// The host and service when both are present and non-empty. Only such
    /// probes have a state change log.
    pub fn host_service(&self) -> Option<(&str, &str)> {
        match self.service.as_deref() {
            Some(service) if !self.host.is_empty() && !service.is_empty() => {
                Some((self.host.as_str(), service))
            }
            _ => None,
        }
    }
}
