use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::router::{Navigator, Route};
use crate::session::service::SessionService;
use crate::session::transport::ApiResponse;

pub const SESSION_INVALID_STATUS: u16 = 401;

#[derive(Debug, Clone, PartialEq)]
pub enum RequestEvent {
    Succeeded(ApiResponse),
    Failed(ApiResponse),
}

impl RequestEvent {
    pub fn response(&self) -> &ApiResponse {
        match self {
            RequestEvent::Succeeded(response) | RequestEvent::Failed(response) => response,
        }
    }

    pub fn is_session_invalid(&self) -> bool {
        matches!(self, RequestEvent::Failed(response) if response.status == SESSION_INVALID_STATUS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Arc<dyn Fn(&RequestEvent) + Send + Sync>;

#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<(SubscriptionId, Subscriber)>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&RequestEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        if let Ok(mut guard) = self.subscribers.lock() {
            guard.push((id, Arc::new(callback)));
        }
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let Ok(mut guard) = self.subscribers.lock() else {
            return false;
        };
        let before = guard.len();
        guard.retain(|(existing, _)| *existing != id);
        guard.len() != before
    }

    /// Delivers `event` to every subscriber in subscription order. The list is
    /// snapshotted first so callbacks may subscribe or emit themselves.
    pub fn emit(&self, event: &RequestEvent) {
        let snapshot = match self.subscribers.lock() {
            Ok(guard) => guard
                .iter()
                .map(|(_, callback)| Arc::clone(callback))
                .collect::<Vec<_>>(),
            Err(_) => return,
        };
        for callback in snapshot {
            callback(event);
        }
    }

    pub fn len(&self) -> usize {
        self.subscribers.lock().map(|guard| guard.len()).unwrap_or(0)
    }
}

/// Wires the process-wide reaction to an invalid session: any 401 clears the
/// stored token and sends the user back to the login view.
pub fn install_session_guard(session: &SessionService, navigator: Navigator) -> SubscriptionId {
    let tokens = session.token_store();
    session.events().subscribe(move |event| {
        if !event.is_session_invalid() {
            return;
        }
        warn!(
            status = event.response().status,
            "session rejected by the server, logging out"
        );
        if let Err(err) = tokens.clear() {
            warn!(error = %err, "failed to clear stored token");
        }
        navigator.navigate(Route::Login);
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use serde_json::json;

    use super::*;

    fn failed(status: u16) -> RequestEvent {
        RequestEvent::Failed(ApiResponse {
            status,
            body: json!({"description": "nope", "code": status}),
        })
    }

    #[test]
    fn subscribers_run_in_order_and_can_unsubscribe() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let first_log = Arc::clone(&log);
        let first = bus.subscribe(move |_| first_log.lock().expect("lock").push("first"));
        let second_log = Arc::clone(&log);
        bus.subscribe(move |_| second_log.lock().expect("lock").push("second"));

        bus.emit(&failed(500));
        assert_eq!(*log.lock().expect("lock"), vec!["first", "second"]);

        assert!(bus.unsubscribe(first));
        assert!(!bus.unsubscribe(first));
        bus.emit(&failed(500));
        assert_eq!(*log.lock().expect("lock"), vec!["first", "second", "second"]);
        assert_eq!(bus.len(), 1);
    }

    #[test]
    fn subscriber_may_subscribe_during_emit() {
        let bus = Arc::new(EventBus::new());
        let hits = Arc::new(AtomicUsize::new(0));

        let inner_bus = Arc::clone(&bus);
        let inner_hits = Arc::clone(&hits);
        bus.subscribe(move |_| {
            let counter = Arc::clone(&inner_hits);
            inner_bus.subscribe(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        });

        bus.emit(&failed(500));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(bus.len(), 2);
    }

    #[test]
    fn only_failed_401_is_session_invalid() {
        assert!(failed(401).is_session_invalid());
        assert!(!failed(403).is_session_invalid());
        let ok = RequestEvent::Succeeded(ApiResponse {
            status: 401,
            body: json!(null),
        });
        assert!(!ok.is_session_invalid());
    }
}
