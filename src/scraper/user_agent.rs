use rand::seq::SliceRandom;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Fallback pool when configuration supplies no user agents
const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0",
];

/// Hands out browser user agents for page fetches and image probes
pub struct UserAgentRotator {
    user_agents: Vec<String>,
    cursor: AtomicUsize,
}

impl UserAgentRotator {
    pub fn new(user_agents: &[String]) -> Self {
        let user_agents = if user_agents.is_empty() {
            DEFAULT_USER_AGENTS.iter().map(|ua| ua.to_string()).collect()
        } else {
            user_agents.to_vec()
        };

        Self {
            user_agents,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn random(&self) -> &str {
        let mut rng = rand::thread_rng();
        self.user_agents
            .choose(&mut rng)
            .map(String::as_str)
            .unwrap_or(DEFAULT_USER_AGENTS[0])
    }

    /// Round-robin selection, deterministic for a fresh rotator
    pub fn next_agent(&self) -> &str {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed);
        &self.user_agents[index % self.user_agents.len()]
    }
}
