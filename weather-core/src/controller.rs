//! Turns user intents into weather lookups and their outcomes into screen
//! updates.
//!
//! Each intent becomes exactly one [`LookupRequest`] and exactly one outcome
//! callback on a [`LookupHandler`]. The screen's handler never touches display
//! state directly: it posts the update to the [`UiHandle`], so rendering always
//! happens on the UI loop regardless of which thread the gateway finished on.
//!
//! Requests are numbered. When several overlap, the most recently submitted
//! one owns the screen and outcomes of older ones are dropped on arrival.
//! In-flight network calls are never cancelled.

use serde::{Deserialize, Serialize};
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use tokio::task::JoinHandle;

use crate::{
    ServiceError, WeatherGateway,
    location::{LocationProvider, first_fix},
    model::{LookupRequest, WeatherResult},
    ui::{LookupPhase, UiHandle, WeatherView},
};

/// What to do with a search that is empty after trimming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptySearchPolicy {
    /// Trim input; fail with [`ServiceError::EmptyQuery`] without calling the gateway.
    #[default]
    Reject,
    /// Pass the raw text to the gateway unchanged.
    Forward,
}

/// Receives the single outcome of a lookup.
pub trait LookupHandler: Send + Sync {
    fn on_lookup_succeeded(&self, result: WeatherResult);
    fn on_lookup_failed(&self, error: ServiceError);
}

/// Route a gateway outcome to exactly one handler callback.
pub fn deliver(outcome: Result<WeatherResult, ServiceError>, handler: &dyn LookupHandler) {
    match outcome {
        Ok(result) => handler.on_lookup_succeeded(result),
        Err(error) => handler.on_lookup_failed(error),
    }
}

/// Completion of one dispatched intent. Dropping it does not cancel anything.
#[derive(Debug)]
pub struct LookupHandle {
    task: Option<JoinHandle<()>>,
}

impl LookupHandle {
    fn completed() -> Self {
        Self { task: None }
    }

    /// Wait until the outcome has been handed to the UI loop.
    pub async fn finished(self) {
        let Some(task) = self.task else { return };
        if let Err(err) = task.await {
            tracing::warn!(error = %err, "lookup task did not complete");
        }
    }
}

/// Posts outcomes of request `seq` onto the UI loop.
#[derive(Debug, Clone)]
struct ScreenHandler {
    ui: UiHandle,
    seq: u64,
}

impl LookupHandler for ScreenHandler {
    fn on_lookup_succeeded(&self, result: WeatherResult) {
        let seq = self.seq;
        self.ui.post(move |state| {
            if state.latest_request != seq {
                tracing::debug!(seq, latest = state.latest_request, "dropping stale weather");
                return;
            }
            let view = WeatherView::from_result(&result);
            tracing::info!(city = %view.city, temperature = %view.temperature, "showing weather");
            state.weather = Some(view);
            state.error = None;
            state.phase = LookupPhase::Succeeded;
        });
    }

    fn on_lookup_failed(&self, error: ServiceError) {
        let seq = self.seq;
        tracing::error!(seq, %error, "weather lookup failed");
        self.ui.post(move |state| {
            if state.latest_request != seq {
                tracing::debug!(seq, latest = state.latest_request, "dropping stale failure");
                return;
            }
            state.error = Some(error.user_message().to_string());
            state.phase = LookupPhase::Failed;
        });
    }
}

/// Owns the screen's intents. Methods must be called inside a tokio runtime.
#[derive(Debug)]
pub struct ScreenController {
    gateway: Arc<dyn WeatherGateway>,
    location: Arc<dyn LocationProvider>,
    ui: UiHandle,
    empty_search: EmptySearchPolicy,
    next_request: AtomicU64,
}

impl ScreenController {
    pub fn new(
        gateway: Arc<dyn WeatherGateway>,
        location: Arc<dyn LocationProvider>,
        ui: UiHandle,
        empty_search: EmptySearchPolicy,
    ) -> Self {
        Self { gateway, location, ui, empty_search, next_request: AtomicU64::new(0) }
    }

    /// Look up weather for the city typed into the search field.
    pub fn submit_city_search(&self, text: &str) -> LookupHandle {
        let handler = self.begin();

        let name = match self.empty_search {
            EmptySearchPolicy::Reject => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    handler.on_lookup_failed(ServiceError::EmptyQuery);
                    return LookupHandle::completed();
                }
                trimmed.to_string()
            }
            EmptySearchPolicy::Forward => text.to_string(),
        };

        self.dispatch(LookupRequest::ByCity(name), handler)
    }

    /// Take one location fix and look up weather for it.
    pub fn request_current_location(&self) -> LookupHandle {
        let handler = self.begin();
        let location = Arc::clone(&self.location);
        let gateway = Arc::clone(&self.gateway);

        let task = tokio::spawn(async move {
            match first_fix(location.as_ref()).await {
                Ok(coordinate) => {
                    let request = LookupRequest::ByCoordinate(coordinate);
                    tracing::debug!(seq = handler.seq, %request, "dispatching lookup");
                    deliver(gateway.fetch(&request).await, &handler);
                }
                Err(err) => handler.on_lookup_failed(err.into()),
            }
        });

        LookupHandle { task: Some(task) }
    }

    /// Number the next request and mark it pending on the screen.
    fn begin(&self) -> ScreenHandler {
        let seq = self.next_request.fetch_add(1, Ordering::Relaxed) + 1;
        self.ui.post(move |state| {
            state.latest_request = seq;
            state.phase = LookupPhase::Pending;
        });
        ScreenHandler { ui: self.ui.clone(), seq }
    }

    fn dispatch(&self, request: LookupRequest, handler: ScreenHandler) -> LookupHandle {
        let gateway = Arc::clone(&self.gateway);

        let task = tokio::spawn(async move {
            tracing::debug!(seq = handler.seq, %request, "dispatching lookup");
            deliver(gateway.fetch(&request).await, &handler);
        });

        LookupHandle { task: Some(task) }
    }
}
