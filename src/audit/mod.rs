//! Per-request audit trail
//!
//! Events are appended while a request runs and written once at the end as an
//! [`AuditRecord`].

use crate::models::AuditRecord;
use chrono::Utc;
use std::time::Instant;
use uuid::Uuid;

pub struct EventTrail {
    ticker: String,
    request_ip: String,
    started: Instant,
    events: Vec<String>,
}

impl EventTrail {
    pub fn new(ticker: impl Into<String>, request_ip: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            request_ip: request_ip.into(),
            started: Instant::now(),
            events: Vec::new(),
        }
    }

    pub fn record(&mut self, event: impl Into<String>) {
        self.events.push(event.into());
    }

    pub fn extend<I>(&mut self, events: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.events.extend(events);
    }

    pub fn events(&self) -> &[String] {
        &self.events
    }

    /// Close the trail; execution time is measured up to this call
    pub fn finish(self) -> AuditRecord {
        AuditRecord {
            audit_id: Uuid::new_v4(),
            ticker: self.ticker,
            timestamp: Utc::now(),
            execution_time_ms: self.started.elapsed().as_millis() as u64,
            request_ip: self.request_ip,
            event_sequence: self.events,
        }
    }
}
