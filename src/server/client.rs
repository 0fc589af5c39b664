//! Client-side work API
//!
//! The orchestrator talks to the coordination server through the
//! `WorkApi` trait; `HttpWorkApi` is the JSON-over-HTTP implementation.
//! Every call is blocking with a 30 second timeout, and every failure is
//! non-fatal to the solve loop.

use std::time::Duration;

use anyhow::{Context, Result};

use crate::server::api::{
    ConfigureRequest, ConfigureResponse, GetWorkRequest, GetWorkResponse, StatusResponse,
    SubmitPoint, SubmitRequest, SubmitResponse,
};

/// Coordination endpoints as seen by a client.
pub trait WorkApi: Send + Sync {
    fn configure(&self, req: &ConfigureRequest) -> Result<ConfigureResponse>;
    fn get_work(&self, client_id: &str) -> Result<GetWorkResponse>;
    fn submit_points(&self, client_id: &str, points: &[SubmitPoint]) -> Result<SubmitResponse>;
    fn status(&self) -> Result<StatusResponse>;
}

/// HTTP transport over `ureq`.
pub struct HttpWorkApi {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpWorkApi {
    pub fn new(base_url: &str) -> Self {
        HttpWorkApi {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent: ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(30))
                .build(),
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }
}

impl WorkApi for HttpWorkApi {
    fn configure(&self, req: &ConfigureRequest) -> Result<ConfigureResponse> {
        let resp = self
            .agent
            .post(&self.url("/api/configure"))
            .send_json(req)
            .context("POST /api/configure")?;
        resp.into_json().context("parsing configure response")
    }

    fn get_work(&self, client_id: &str) -> Result<GetWorkResponse> {
        let body = GetWorkRequest {
            client_id: client_id.to_string(),
        };
        let resp = self
            .agent
            .post(&self.url("/api/get_work"))
            .send_json(&body)
            .context("POST /api/get_work")?;
        resp.into_json().context("parsing work response")
    }

    fn submit_points(&self, client_id: &str, points: &[SubmitPoint]) -> Result<SubmitResponse> {
        let body = SubmitRequest {
            client_id: client_id.to_string(),
            points: points.to_vec(),
        };
        let resp = self
            .agent
            .post(&self.url("/api/submit_points"))
            .send_json(&body)
            .context("POST /api/submit_points")?;
        resp.into_json().context("parsing submit response")
    }

    fn status(&self) -> Result<StatusResponse> {
        let resp = self
            .agent
            .get(&self.url("/api/status"))
            .call()
            .context("GET /api/status")?;
        resp.into_json().context("parsing status response")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_normalisation() {
        let api = HttpWorkApi::new("http://example.test:8080/");
        assert_eq!(
            api.url("/api/status"),
            "http://example.test:8080/api/status"
        );
    }

    #[test]
    fn unreachable_server_is_an_error_not_a_panic() {
        // discard port: nothing listens there, so the call errors fast
        let api = HttpWorkApi::new("http://127.0.0.1:9");
        assert!(api.status().is_err());
    }
}
