//! Engine settings.

/// Run-related engine configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Max engine events buffered between the run task and the consumer.
    pub event_buffer: usize,
    /// Max graph hops per run (per resume segment); guards against cycles.
    pub max_steps: usize,
    /// Model name recorded on runs that do not name one.
    pub default_model: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_buffer: 128,
            max_steps: 1000,
            default_model: "gpt-4o-mini".to_string(),
        }
    }
}

impl EngineConfig {
    /// Builds the config from environment variables, falling back to [`Default`] for unset or
    /// invalid values.
    ///
    /// - `TRELLIS_EVENT_BUFFER` (default 128, minimum 1)
    /// - `TRELLIS_MAX_STEPS` (default 1000, minimum 1)
    /// - `TRELLIS_MODEL` (default `gpt-4o-mini`)
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            event_buffer: std::env::var("TRELLIS_EVENT_BUFFER")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(default.event_buffer),
            max_steps: std::env::var("TRELLIS_MAX_STEPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(default.max_steps),
            default_model: std::env::var("TRELLIS_MODEL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(default.default_model),
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn with_event_buffer(mut self, event_buffer: usize) -> Self {
        self.event_buffer = event_buffer.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_clamp_to_one() {
        let cfg = EngineConfig::default().with_max_steps(0).with_event_buffer(0);
        assert_eq!(cfg.max_steps, 1);
        assert_eq!(cfg.event_buffer, 1);
    }

    /// **Scenario**: Invalid env values fall back to defaults; valid ones apply.
    #[test]
    fn from_env_parses_and_falls_back() {
        std::env::set_var("TRELLIS_EVENT_BUFFER", "not-a-number");
        std::env::set_var("TRELLIS_MAX_STEPS", "25");
        std::env::set_var("TRELLIS_MODEL", "  ");
        let cfg = EngineConfig::from_env();
        std::env::remove_var("TRELLIS_EVENT_BUFFER");
        std::env::remove_var("TRELLIS_MAX_STEPS");
        std::env::remove_var("TRELLIS_MODEL");

        assert_eq!(cfg.event_buffer, 128);
        assert_eq!(cfg.max_steps, 25);
        assert_eq!(cfg.default_model, "gpt-4o-mini");
    }
}
