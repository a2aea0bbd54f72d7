// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Out-of-band event channel from extensions to the host.
//!
//! This is the only channel for reporting anomalies back to the host: most
//! lifecycle calls only return a boolean, so a source vanishing, a background
//! thread failing or a device list changing all surface here. Events are
//! mirrored into `tracing` at the matching level so host logs stay useful
//! even when nobody drains the channel.

use crossbeam_channel::{Receiver, Sender, unbounded};

/// Event severity, ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(i32)]
pub enum EventSeverity {
    Verbose = -1,
    Info = 0,
    Warning = 1,
    Error = 2,
}

/// Event category. Discriminants are part of the wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum EventCategory {
    /// Free-text log message.
    Message = 0,
    /// The set of available stream devices changed; re-enumerate.
    DevicesChanged = 4,
    /// An object hit an unrecoverable condition.
    Failed = 11,
    /// The set of available streams changed; re-enumerate.
    StreamsChanged = 12,
}

/// One event as delivered to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEvent {
    pub severity: EventSeverity,
    pub category: EventCategory,
    pub message: String,
}

/// Sending side handed to extension objects (via the host context).
#[derive(Clone)]
pub struct EventSender {
    tx: Sender<HostEvent>,
}

impl EventSender {
    pub fn send(&self, severity: EventSeverity, category: EventCategory, message: &str) {
        match severity {
            EventSeverity::Verbose => tracing::debug!(?category, "{message}"),
            EventSeverity::Info => tracing::info!(?category, "{message}"),
            EventSeverity::Warning => tracing::warn!(?category, "{message}"),
            EventSeverity::Error => tracing::error!(?category, "{message}"),
        }
        // Receiver may be gone during host teardown; events are advisory.
        let _ = self.tx.send(HostEvent {
            severity,
            category,
            message: message.to_string(),
        });
    }
}

/// Create the host event channel.
pub fn event_channel() -> (EventSender, Receiver<HostEvent>) {
    let (tx, rx) = unbounded();
    (EventSender { tx }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_arrive_in_order() {
        let (tx, rx) = event_channel();
        tx.send(EventSeverity::Info, EventCategory::StreamsChanged, "");
        tx.send(EventSeverity::Error, EventCategory::Failed, "boom");
        let first = rx.try_recv().unwrap();
        assert_eq!(first.category, EventCategory::StreamsChanged);
        let second = rx.try_recv().unwrap();
        assert_eq!(second.severity, EventSeverity::Error);
        assert_eq!(second.message, "boom");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_send_without_receiver_does_not_panic() {
        let (tx, rx) = event_channel();
        drop(rx);
        tx.send(EventSeverity::Warning, EventCategory::Message, "dropped");
    }

    #[test]
    fn test_category_discriminants() {
        assert_eq!(EventCategory::Message as u32, 0);
        assert_eq!(EventCategory::DevicesChanged as u32, 4);
        assert_eq!(EventCategory::Failed as u32, 11);
        assert_eq!(EventCategory::StreamsChanged as u32, 12);
    }
}
