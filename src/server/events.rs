use crate::error::{Error, Result};
use crate::server::{ServerId, ServerStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// Server lifecycle event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServerLifecycleEvent {
    /// Entity created in `Offline`
    Created,
    /// Start accepted
    Starting,
    /// Launch succeeded
    Started,
    /// Launch failed, server reverted to `Offline`
    LaunchFailed,
    /// Stop accepted
    Stopping,
    /// Terminate succeeded
    Stopped,
    /// Terminate failed, server reverted to `Online`
    TerminateFailed,
    /// Launch or terminate exceeded its bound
    TimedOut,
    /// Container observed dead while `Online`
    Crashed,
    /// Status resolved after a panel restart
    Recovered,
}

/// Server lifecycle event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerEvent {
    /// Server ID
    pub server_id: ServerId,
    /// Server name
    pub server_name: String,
    /// Event type
    pub event: ServerLifecycleEvent,
    /// Status after the event
    pub status: ServerStatus,
    /// Event timestamp
    pub timestamp: DateTime<Utc>,
    /// Event details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Bounded lifecycle history plus a live broadcast of every recorded event
#[derive(Debug, Clone)]
pub struct EventLog {
    history: Arc<Mutex<VecDeque<ServerEvent>>>,
    max_history: usize,
    sender: broadcast::Sender<ServerEvent>,
}

impl EventLog {
    pub fn new(max_history: usize, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            history: Arc::new(Mutex::new(VecDeque::with_capacity(max_history.min(1024)))),
            max_history,
            sender,
        }
    }

    /// Record an event and broadcast it to live subscribers
    pub fn record(
        &self,
        server_id: ServerId,
        server_name: &str,
        event: ServerLifecycleEvent,
        status: ServerStatus,
        details: Option<String>,
    ) -> Result<()> {
        let server_event = ServerEvent {
            server_id,
            server_name: server_name.to_string(),
            event,
            status,
            timestamp: Utc::now(),
            details,
        };

        {
            let mut history = self
                .history
                .lock()
                .map_err(|_| Error::Other("Failed to lock server events".to_string()))?;

            history.push_back(server_event.clone());
            while history.len() > self.max_history {
                history.pop_front();
            }
        }

        match self.sender.send(server_event) {
            Ok(receivers) => {
                tracing::trace!(receivers, ?event, "Lifecycle event broadcast");
            }
            Err(_) => {
                tracing::trace!(?event, "Lifecycle event recorded but no subscribers");
            }
        }

        Ok(())
    }

    /// Get recent events for a server, newest first
    pub fn server_events(&self, id: ServerId, limit: Option<usize>) -> Result<Vec<ServerEvent>> {
        let history = self
            .history
            .lock()
            .map_err(|_| Error::Other("Failed to lock server events".to_string()))?;

        let events = history
            .iter()
            .rev()
            .filter(|e| e.server_id == id)
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();

        Ok(events)
    }

    /// Get all recent events, newest first
    pub fn all_events(&self, limit: Option<usize>) -> Result<Vec<ServerEvent>> {
        let history = self
            .history
            .lock()
            .map_err(|_| Error::Other("Failed to lock server events".to_string()))?;

        Ok(history
            .iter()
            .rev()
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    /// Subscribe to events recorded from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }
}
