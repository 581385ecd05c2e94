use std::time::Duration;

/// Tunables shared by the payment flows.
///
/// Defaults match the behavior callers expect from the hosted deployments:
/// pending state lives for five minutes, elicitation asks five times, the
/// progress flow polls every three seconds for up to fifteen minutes.
#[derive(Debug, Clone)]
pub struct FlowConfig {
    /// TTL applied to pending state written by the elicitation flow.
    pub state_ttl: Duration,
    /// Maximum accept/cancel prompts per elicitation call.
    pub elicitation_attempts: u32,
    /// Quick mode caps elicitation at two attempts.
    pub quick_mode: bool,
    /// Interval between provider status polls in the progress flow.
    pub poll_interval: Duration,
    /// Ceiling on how long the progress flow holds a call open.
    pub max_wait: Duration,
    /// Age past which pending-payment index entries read as absent.
    pub pending_horizon: Duration,
    /// Restrict index recovery to the client that created the entry.
    pub strict_client_match: bool,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            state_ttl: Duration::from_secs(300),
            elicitation_attempts: 5,
            quick_mode: false,
            poll_interval: Duration::from_secs(3),
            max_wait: Duration::from_secs(15 * 60),
            pending_horizon: Duration::from_secs(300),
            strict_client_match: false,
        }
    }
}

impl FlowConfig {
    /// Defaults with `PAYGATE_QUICK_MODE` and `PAYGATE_STRICT_CLIENT_MATCH`
    /// applied from the environment ("true" or "1" enables).
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.quick_mode = env_flag("PAYGATE_QUICK_MODE");
        config.strict_client_match = env_flag("PAYGATE_STRICT_CLIENT_MATCH");
        config
    }

    /// Effective elicitation attempt budget after quick mode.
    pub fn attempt_budget(&self) -> u32 {
        if self.quick_mode {
            self.elicitation_attempts.min(2)
        } else {
            self.elicitation_attempts
        }
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| {
            let v = v.trim().to_ascii_lowercase();
            v == "true" || v == "1"
        })
        .unwrap_or(false)
}
