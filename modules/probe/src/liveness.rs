//! HTTP(S) liveness: an explicit two-attempt state machine over a shared client.

use crate::ProbeConfig;
use anyhow::Result;
use monitor_core::ProbeStatus;
use reqwest::{redirect::Policy, Client, StatusCode};
use tracing::debug;

/// Statuses worth one immediate second GET.
const RETRY_STATUSES: &[u16] = &[429, 500, 502, 503, 504];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Https,
    Http,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Https => "https",
            Scheme::Http => "http",
        }
    }
}

/// What one scheme attempt produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Responded(u16),
    Failed,
}

impl AttemptOutcome {
    pub fn is_success_like(self) -> bool {
        matches!(self, AttemptOutcome::Responded(code) if (200..400).contains(&code))
    }
}

/// `AttemptHttps -> (Live | AttemptHttp) -> (Live | Down)`.
///
/// Any outcome that is not a 2xx/3xx response moves on, whether the
/// request errored or the server answered 403.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessState {
    AttemptHttps,
    AttemptHttp,
    Done(ProbeStatus),
}

impl LivenessState {
    pub fn scheme(self) -> Option<Scheme> {
        match self {
            LivenessState::AttemptHttps => Some(Scheme::Https),
            LivenessState::AttemptHttp => Some(Scheme::Http),
            LivenessState::Done(_) => None,
        }
    }

    pub fn next(self, outcome: AttemptOutcome) -> LivenessState {
        match self {
            LivenessState::Done(_) => self,
            _ if outcome.is_success_like() => LivenessState::Done(ProbeStatus::Live),
            LivenessState::AttemptHttps => LivenessState::AttemptHttp,
            LivenessState::AttemptHttp => LivenessState::Done(ProbeStatus::Down),
        }
    }
}

/// Build the pooled client shared by every probe of a scanner.
pub fn build_client(cfg: &ProbeConfig) -> Result<Client> {
    let client = Client::builder()
        .redirect(Policy::none())
        .connect_timeout(cfg.connect_timeout)
        .read_timeout(cfg.read_timeout)
        .user_agent(cfg.user_agent.clone())
        .pool_max_idle_per_host(cfg.pool_max_idle_per_host)
        .no_proxy()
        .build()?;
    Ok(client)
}

pub struct LivenessChecker {
    client: Client,
    https_port: u16,
    http_port: u16,
    retries: u32,
}

impl LivenessChecker {
    pub fn new(client: Client, cfg: &ProbeConfig) -> Self {
        LivenessChecker {
            client,
            https_port: cfg.https_port,
            http_port: cfg.http_port,
            retries: cfg.retries,
        }
    }

    pub async fn check(&self, host: &str) -> ProbeStatus {
        let mut state = LivenessState::AttemptHttps;
        while let Some(scheme) = state.scheme() {
            let outcome = self.attempt(scheme, host).await;
            debug!(host, scheme = scheme.as_str(), ?outcome, "liveness attempt");
            state = state.next(outcome);
        }
        match state {
            LivenessState::Done(status) => status,
            _ => ProbeStatus::Down,
        }
    }

    async fn attempt(&self, scheme: Scheme, host: &str) -> AttemptOutcome {
        let port = match scheme {
            Scheme::Https => self.https_port,
            Scheme::Http => self.http_port,
        };
        let url = format!("{}://{}:{}/", scheme.as_str(), host, port);
        match self.get_with_retry(&url).await {
            Ok(status) => AttemptOutcome::Responded(status.as_u16()),
            Err(e) => {
                debug!(url = %url, error = %e, "request failed");
                AttemptOutcome::Failed
            }
        }
    }

    async fn get_with_retry(&self, url: &str) -> reqwest::Result<StatusCode> {
        let mut retries_left = self.retries;
        loop {
            let status = self.client.get(url).send().await?.status();
            if retries_left > 0 && RETRY_STATUSES.contains(&status.as_u16()) {
                retries_left -= 1;
                debug!(url, status = status.as_u16(), "retrying transient status");
                continue;
            }
            return Ok(status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_like_range_is_200_to_399() {
        assert!(AttemptOutcome::Responded(200).is_success_like());
        assert!(AttemptOutcome::Responded(301).is_success_like());
        assert!(AttemptOutcome::Responded(399).is_success_like());
        assert!(!AttemptOutcome::Responded(199).is_success_like());
        assert!(!AttemptOutcome::Responded(400).is_success_like());
        assert!(!AttemptOutcome::Responded(503).is_success_like());
        assert!(!AttemptOutcome::Failed.is_success_like());
    }

    #[test]
    fn https_success_stops_immediately() {
        let s = LivenessState::AttemptHttps.next(AttemptOutcome::Responded(200));
        assert_eq!(s, LivenessState::Done(ProbeStatus::Live));
        assert_eq!(s.scheme(), None);
    }

    #[test]
    fn https_error_or_bad_status_falls_back_to_http() {
        assert_eq!(LivenessState::AttemptHttps.next(AttemptOutcome::Failed), LivenessState::AttemptHttp);
        assert_eq!(LivenessState::AttemptHttps.next(AttemptOutcome::Responded(403)), LivenessState::AttemptHttp);
    }

    #[test]
    fn http_attempt_decides_final_status() {
        assert_eq!(
            LivenessState::AttemptHttp.next(AttemptOutcome::Responded(302)),
            LivenessState::Done(ProbeStatus::Live)
        );
        assert_eq!(
            LivenessState::AttemptHttp.next(AttemptOutcome::Responded(500)),
            LivenessState::Done(ProbeStatus::Down)
        );
        assert_eq!(LivenessState::AttemptHttp.next(AttemptOutcome::Failed), LivenessState::Done(ProbeStatus::Down));
    }

    #[test]
    fn done_is_terminal() {
        let done = LivenessState::Done(ProbeStatus::Down);
        assert_eq!(done.next(AttemptOutcome::Responded(200)), done);
    }
}
