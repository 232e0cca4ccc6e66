//! The screen's single UI execution context.
//!
//! [`UiLoop`] owns the [`ScreenState`] and the display surface. Nothing else
//! holds a reference to either, so every display mutation has to be posted
//! through a [`UiHandle`] and runs on whichever thread drives the loop.

use chrono::{DateTime, Local};
use tokio::sync::{mpsc, oneshot};

use crate::model::WeatherResult;

/// Work to run on the UI loop.
pub type UiTask = Box<dyn FnOnce(&mut ScreenState) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LookupPhase {
    #[default]
    Idle,
    Pending,
    Succeeded,
    Failed,
}

/// The three weather fields as shown.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherView {
    pub temperature: String,
    pub city: String,
    pub icon: String,
    pub updated_at: DateTime<Local>,
}

impl WeatherView {
    pub fn from_result(result: &WeatherResult) -> Self {
        Self {
            temperature: result.temperature_string(),
            city: result.city_name.clone(),
            icon: result.condition_code.clone(),
            updated_at: Local::now(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScreenState {
    pub phase: LookupPhase,
    pub weather: Option<WeatherView>,
    pub error: Option<String>,
    /// Sequence number of the most recently issued request.
    pub latest_request: u64,
}

/// Where the screen is drawn. Called on the UI loop after every task.
pub trait DisplaySurface: Send {
    fn render(&mut self, state: &ScreenState);
}

/// Cloneable entry point for posting work onto the UI loop.
#[derive(Debug, Clone)]
pub struct UiHandle {
    tx: mpsc::UnboundedSender<UiTask>,
}

impl UiHandle {
    /// Queue `task`. Returns false when the loop has shut down.
    pub fn post(&self, task: impl FnOnce(&mut ScreenState) + Send + 'static) -> bool {
        let posted = self.tx.send(Box::new(task)).is_ok();
        if !posted {
            tracing::debug!("UI loop is gone; dropping task");
        }
        posted
    }

    /// Resolve once every task posted before this call has been rendered.
    pub async fn flushed(&self) {
        let (tx, rx) = oneshot::channel();
        if self.post(move |_| {
            let _ = tx.send(());
        }) {
            let _ = rx.await;
        }
    }
}

pub struct UiLoop<D> {
    rx: mpsc::UnboundedReceiver<UiTask>,
    state: ScreenState,
    display: D,
}

impl<D: DisplaySurface> UiLoop<D> {
    pub fn new(display: D) -> (Self, UiHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let ui = Self { rx, state: ScreenState::default(), display };
        (ui, UiHandle { tx })
    }

    /// Process tasks until every [`UiHandle`] is dropped.
    pub async fn run(mut self) -> D {
        while let Some(task) = self.rx.recv().await {
            self.apply(task);
        }
        self.display
    }

    /// Same as [`UiLoop::run`], for a dedicated thread outside any runtime.
    pub fn run_blocking(mut self) -> D {
        while let Some(task) = self.rx.blocking_recv() {
            self.apply(task);
        }
        self.display
    }

    /// Run whatever is already queued and return how many tasks ran.
    pub fn drain_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.rx.try_recv() {
            self.apply(task);
            ran += 1;
        }
        ran
    }

    pub fn state(&self) -> &ScreenState {
        &self.state
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    fn apply(&mut self, task: UiTask) {
        task(&mut self.state);
        self.display.render(&self.state);
    }
}
