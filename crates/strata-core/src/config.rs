use crate::{logging, profiling};

/// Engine-wide switches shared by the Strata crates.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub profiling: ProfilingMode,
    /// `tracing` directives, `None` falls back to [`logging::DEFAULT_FILTER`].
    pub log_filter: Option<String>,
}

impl Config {
    /// Install logging and profiling as configured.
    pub fn apply(&self) {
        match &self.log_filter {
            Some(filter) => logging::init_with_filter(filter),
            None => logging::init(),
        }
        profiling::init_profiling(self.profiling);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProfilingMode {
    /// Profiling scopes are disabled
    #[default]
    Off,
    /// Scopes are recorded in-process
    On,
    /// Scopes are recorded and served to `puffin_viewer` over HTTP
    WithServer,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.profiling, ProfilingMode::Off);
        assert!(config.log_filter.is_none());
    }
}
