//! HTTP event reporter adapter.
//!
//! Implements [`EventReporter`] by POSTing each confirmed crossing to the
//! collector as `{"direction":"in"}` / `{"direction":"out"}`.  Only a
//! 200 response counts as delivered.  Failures are returned to the caller
//! and never retried; the local counters are already committed by then.
//!
//! - **`target_os = "espidf"`**: `EspHttpConnection` through the
//!   `embedded_svc` blocking client, one connection per report.
//! - **all other targets**: a simulated collector that logs the body and
//!   answers with a scripted status.

use log::info;
use serde::Serialize;

use crate::app::ports::EventReporter;
use crate::config::SystemConfig;
use crate::error::CommsError;
use crate::fsm::context::Direction;

#[cfg(target_os = "espidf")]
use esp_idf_svc::http::client::{Configuration as HttpConfiguration, EspHttpConnection};

#[derive(Serialize)]
struct DirectionReport {
    direction: Direction,
}

/// Serialize the JSON body for one crossing.
pub fn encode_report(direction: Direction) -> Result<String, CommsError> {
    serde_json::to_string(&DirectionReport { direction })
        .map_err(|_| CommsError::ReportEncodeFailed)
}

pub struct HttpReporter {
    url: heapless::String<128>,
    timeout_ms: u32,
    sent: u32,
    /// Simulation: status the fake collector answers with.
    #[cfg(not(target_os = "espidf"))]
    sim_status: u16,
    /// Simulation: every body "sent" so far.
    #[cfg(not(target_os = "espidf"))]
    sim_bodies: Vec<String>,
}

impl HttpReporter {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            url: config.report_url.clone(),
            timeout_ms: config.report_timeout_ms,
            sent: 0,
            #[cfg(not(target_os = "espidf"))]
            sim_status: 200,
            #[cfg(not(target_os = "espidf"))]
            sim_bodies: Vec::new(),
        }
    }

    /// Reports acknowledged with a 200 since boot.
    pub fn delivered(&self) -> u32 {
        self.sent
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_set_status(&mut self, status: u16) {
        self.sim_status = status;
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_bodies(&self) -> &[String] {
        &self.sim_bodies
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn post(&mut self, body: &str) -> Result<u16, CommsError> {
        use embedded_svc::http::client::Client;
        use embedded_svc::io::Write;

        let transport = |e: esp_idf_svc::io::EspIOError| {
            log::warn!("report(espidf): {}", e);
            CommsError::ReportTransportFailed
        };

        let conn = EspHttpConnection::new(&HttpConfiguration {
            timeout: Some(core::time::Duration::from_millis(u64::from(self.timeout_ms))),
            ..Default::default()
        })
        .map_err(|e| transport(e.into()))?;
        let mut client = Client::wrap(conn);

        let len = body.len().to_string();
        let headers = [
            ("Content-Type", "application/json"),
            ("Content-Length", len.as_str()),
        ];
        let mut request = client.post(&self.url, &headers).map_err(transport)?;
        request.write_all(body.as_bytes()).map_err(transport)?;
        request.flush().map_err(transport)?;
        let response = request.submit().map_err(transport)?;
        Ok(response.status())
    }

    #[cfg(not(target_os = "espidf"))]
    fn post(&mut self, body: &str) -> Result<u16, CommsError> {
        log::debug!(
            "report(sim): POST {} ({}ms timeout) {}",
            self.url, self.timeout_ms, body
        );
        self.sim_bodies.push(body.to_string());
        Ok(self.sim_status)
    }
}

impl EventReporter for HttpReporter {
    fn report(&mut self, direction: Direction) -> Result<(), CommsError> {
        let body = encode_report(direction)?;
        match self.post(&body)? {
            200 => {
                self.sent = self.sent.wrapping_add(1);
                info!("report: '{}' delivered", direction);
                Ok(())
            }
            status => Err(CommsError::ReportRejected(status)),
        }
    }
}
