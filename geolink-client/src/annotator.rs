use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use geolink_core::status::normalize_status;
use geolink_core::{StatusRequest, FALLBACK_STATUS};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::session::SharedStore;

pub trait TextGenerator: Send + Sync + 'static {
    fn generate(
        &self,
        request: &StatusRequest,
    ) -> impl Future<Output = Result<String, GenerateError>> + Send;
}

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("generator returned HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("response carried no text")]
    EmptyResponse,
    #[error("{0}")]
    Other(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnnotateError {
    #[error("no contact with id {0}")]
    UnknownContact(String),
    #[error("status request for {0} already in flight")]
    InFlight(String),
}

pub struct StatusAnnotator<T> {
    generator: Arc<T>,
    store: SharedStore,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl<T> Clone for StatusAnnotator<T> {
    fn clone(&self) -> Self {
        Self {
            generator: Arc::clone(&self.generator),
            store: Arc::clone(&self.store),
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

impl<T: TextGenerator> StatusAnnotator<T> {
    pub fn new(generator: Arc<T>, store: SharedStore) -> Self {
        Self {
            generator,
            store,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn is_loading(&self, contact_id: &str) -> bool {
        self.in_flight.lock().contains(contact_id)
    }

    pub async fn request_status(&self, contact_id: &str) -> Result<String, AnnotateError> {
        let _loading = InFlightGuard::acquire(&self.in_flight, contact_id)
            .ok_or_else(|| AnnotateError::InFlight(contact_id.to_string()))?;

        let (request, generation) = {
            let store = self.store.lock();
            let contact = store
                .contact(contact_id)
                .ok_or_else(|| AnnotateError::UnknownContact(contact_id.to_string()))?;
            (
                StatusRequest::for_contact(contact, local_time()),
                contact.generation,
            )
        };

        let text = match self.generator.generate(&request).await {
            Ok(raw) => normalize_status(&raw),
            Err(err) => {
                warn!(contact = contact_id, "status generation failed: {err}");
                FALLBACK_STATUS.to_string()
            }
        };

        let stored = self
            .store
            .lock()
            .update_contact_status_for(contact_id, generation, &text);
        if !stored {
            debug!(contact = contact_id, "contact changed while generating; status dropped");
        }
        Ok(text)
    }
}

fn local_time() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

// Clears the loading flag on every exit path, cancellation included.
struct InFlightGuard {
    set: Arc<Mutex<HashSet<String>>>,
    id: String,
}

impl InFlightGuard {
    fn acquire(set: &Arc<Mutex<HashSet<String>>>, id: &str) -> Option<Self> {
        if !set.lock().insert(id.to_string()) {
            return None;
        }
        Some(Self {
            set: Arc::clone(set),
            id: id.to_string(),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set.lock().remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geolink_core::{Contact, Coordinates, EntityStore, Presence};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    struct Echo;

    impl TextGenerator for Echo {
        async fn generate(&self, request: &StatusRequest) -> Result<String, GenerateError> {
            Ok(format!("  {} is out and about.  ", request.name))
        }
    }

    struct Failing;

    impl TextGenerator for Failing {
        async fn generate(&self, _request: &StatusRequest) -> Result<String, GenerateError> {
            Err(GenerateError::Other("quota exceeded".into()))
        }
    }

    struct Blank;

    impl TextGenerator for Blank {
        async fn generate(&self, _request: &StatusRequest) -> Result<String, GenerateError> {
            Ok(String::new())
        }
    }

    #[derive(Default)]
    struct Gated {
        gate: Notify,
        calls: AtomicUsize,
    }

    impl TextGenerator for Gated {
        async fn generate(&self, request: &StatusRequest) -> Result<String, GenerateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            Ok(format!("{} checked in", request.name))
        }
    }

    fn shared_store() -> SharedStore {
        let mut store = EntityStore::new(Presence {
            id: "USR-1".into(),
            name: "ana".into(),
            avatar: "a.png".into(),
            last_updated_ms: 0,
            location: Some(Coordinates::new(0.0, 0.0)),
        });
        store.add_contact(Contact::new("C1", "Bia", "b.png").with_status("Connected."));
        Arc::new(Mutex::new(store))
    }

    async fn wait_until_loading<T: TextGenerator>(annotator: &StatusAnnotator<T>, id: &str) {
        for _ in 0..100 {
            if annotator.is_loading(id) {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("request for {id} never started");
    }

    #[tokio::test]
    async fn stores_trimmed_text() {
        let store = shared_store();
        let annotator = StatusAnnotator::new(Arc::new(Echo), store.clone());
        let text = annotator.request_status("C1").await.unwrap();
        assert_eq!(text, "Bia is out and about.");
        assert_eq!(store.lock().contact("C1").unwrap().status_message, text);
        assert!(!annotator.is_loading("C1"));
    }

    #[tokio::test]
    async fn failures_and_blank_output_fall_back() {
        let store = shared_store();
        let failing = StatusAnnotator::new(Arc::new(Failing), store.clone());
        assert_eq!(failing.request_status("C1").await.unwrap(), FALLBACK_STATUS);
        assert_eq!(store.lock().contact("C1").unwrap().status_message, FALLBACK_STATUS);
        assert!(!failing.is_loading("C1"));

        store.lock().update_contact_status("C1", "reset");
        let blank = StatusAnnotator::new(Arc::new(Blank), store.clone());
        assert_eq!(blank.request_status("C1").await.unwrap(), FALLBACK_STATUS);
    }

    #[tokio::test]
    async fn unknown_contact_is_an_error() {
        let annotator = StatusAnnotator::new(Arc::new(Echo), shared_store());
        assert_eq!(
            annotator.request_status("nobody").await,
            Err(AnnotateError::UnknownContact("nobody".into()))
        );
        assert!(!annotator.is_loading("nobody"));
    }

    #[tokio::test]
    async fn second_request_is_rejected_while_first_runs() {
        let generator = Arc::new(Gated::default());
        let annotator = StatusAnnotator::new(generator.clone(), shared_store());

        let first = tokio::spawn({
            let annotator = annotator.clone();
            async move { annotator.request_status("C1").await }
        });
        wait_until_loading(&annotator, "C1").await;
        assert_eq!(
            annotator.request_status("C1").await,
            Err(AnnotateError::InFlight("C1".into()))
        );

        generator.gate.notify_one();
        assert_eq!(first.await.unwrap().unwrap(), "Bia checked in");
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
        assert!(!annotator.is_loading("C1"));
    }

    #[tokio::test]
    async fn result_for_a_replaced_contact_is_dropped() {
        let generator = Arc::new(Gated::default());
        let store = shared_store();
        let annotator = StatusAnnotator::new(generator.clone(), store.clone());

        let pending = tokio::spawn({
            let annotator = annotator.clone();
            async move { annotator.request_status("C1").await }
        });
        wait_until_loading(&annotator, "C1").await;
        {
            let mut store = store.lock();
            store.remove_contact("C1");
            store.add_contact(Contact::new("C1", "Bia", "b.png").with_status("fresh"));
        }

        generator.gate.notify_one();
        assert_eq!(pending.await.unwrap().unwrap(), "Bia checked in");
        assert_eq!(store.lock().contact("C1").unwrap().status_message, "fresh");
    }

    #[tokio::test]
    async fn cancelled_request_clears_loading() {
        let generator = Arc::new(Gated::default());
        let annotator = StatusAnnotator::new(generator, shared_store());

        let pending = tokio::spawn({
            let annotator = annotator.clone();
            async move { annotator.request_status("C1").await }
        });
        wait_until_loading(&annotator, "C1").await;
        pending.abort();
        assert!(pending.await.unwrap_err().is_cancelled());
        assert!(!annotator.is_loading("C1"));
    }
}
