//! Sources of the device's "current location".
//!
//! A provider delivers fixes through a channel once started and may keep
//! producing them until `stop_updates` is called for that session. Sessions
//! are independent: stopping one never affects another that is still
//! running. Consumers that only want a single reading use [`first_fix`].

use reqwest::Client;
use serde::Deserialize;
use std::{
    collections::HashMap,
    fmt::Debug,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use tokio::{sync::mpsc, task::AbortHandle};

use crate::{Config, LocationError, model::Coordinate};

pub type LocationUpdate = Result<Coordinate, LocationError>;

/// Identifies one `start_updates` call on a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SessionId(pub u64);

/// Receiving end of one update session.
#[derive(Debug)]
pub struct LocationUpdates {
    session: SessionId,
    rx: mpsc::UnboundedReceiver<LocationUpdate>,
}

impl LocationUpdates {
    pub fn new(session: SessionId, rx: mpsc::UnboundedReceiver<LocationUpdate>) -> Self {
        Self { session, rx }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub async fn recv(&mut self) -> Option<LocationUpdate> {
        self.rx.recv().await
    }

    fn discard_queued(&mut self) -> usize {
        std::iter::from_fn(|| self.rx.try_recv().ok()).count()
    }
}

/// Providers with a single session at a time use the default id.
impl From<mpsc::UnboundedReceiver<LocationUpdate>> for LocationUpdates {
    fn from(rx: mpsc::UnboundedReceiver<LocationUpdate>) -> Self {
        Self::new(SessionId::default(), rx)
    }
}

pub trait LocationProvider: Send + Sync + Debug {
    /// Begin a session of location updates. Must be called inside a tokio runtime.
    fn start_updates(&self) -> LocationUpdates;

    /// Stop delivering updates for `session` only.
    fn stop_updates(&self, session: SessionId);
}

/// Wait for the first update, then silence the provider.
///
/// Anything the provider emits after the first update is discarded along
/// with the receiver.
pub async fn first_fix(provider: &dyn LocationProvider) -> LocationUpdate {
    let mut updates = provider.start_updates();
    let first = updates.recv().await;
    provider.stop_updates(updates.session());

    let dropped = updates.discard_queued();
    if dropped > 0 {
        tracing::warn!(dropped, "ignored location updates after the first fix");
    }

    first.unwrap_or(Err(LocationError::ServiceUnavailable))
}

/// Always reports the same coordinate.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocationProvider {
    coordinate: Coordinate,
}

impl FixedLocationProvider {
    pub fn new(coordinate: Coordinate) -> Self {
        Self { coordinate }
    }
}

impl LocationProvider for FixedLocationProvider {
    fn start_updates(&self) -> LocationUpdates {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(Ok(self.coordinate));
        rx.into()
    }

    fn stop_updates(&self, _session: SessionId) {}
}

/// Approximate location from an IP geolocation service.
#[derive(Debug)]
pub struct IpLocationProvider {
    url: String,
    http: Client,
    next_session: AtomicU64,
    in_flight: Mutex<HashMap<SessionId, AbortHandle>>,
}

#[derive(Debug, Deserialize)]
struct IpLookupResponse {
    status: String,
    lat: Option<f64>,
    lon: Option<f64>,
    message: Option<String>,
}

impl IpLocationProvider {
    pub fn new(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: url.into(),
            http,
            next_session: AtomicU64::new(1),
            in_flight: Mutex::new(HashMap::new()),
        })
    }

    async fn lookup(http: Client, url: String) -> LocationUpdate {
        let res = http
            .get(&url)
            .send()
            .await
            .map_err(|e| LocationError::Lookup(format!("request failed: {e}")))?;

        if !res.status().is_success() {
            return Err(LocationError::Lookup(format!("status {}", res.status())));
        }

        let body: IpLookupResponse = res
            .json()
            .await
            .map_err(|e| LocationError::Lookup(format!("invalid response: {e}")))?;

        match (body.status.as_str(), body.lat, body.lon) {
            ("success", Some(lat), Some(lon)) => Ok(Coordinate::new(lat, lon)),
            _ => Err(LocationError::Lookup(
                body.message.unwrap_or_else(|| format!("lookup status '{}'", body.status)),
            )),
        }
    }
}

impl LocationProvider for IpLocationProvider {
    fn start_updates(&self) -> LocationUpdates {
        let session = SessionId(self.next_session.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        let http = self.http.clone();
        let url = self.url.clone();

        let task = tokio::spawn(async move {
            let update = Self::lookup(http, url).await;
            let _ = tx.send(update);
        });

        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session, task.abort_handle());
        LocationUpdates::new(session, rx)
    }

    fn stop_updates(&self, session: SessionId) {
        let handle =
            self.in_flight.lock().unwrap_or_else(PoisonError::into_inner).remove(&session);
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

/// Fixed location when configured, IP lookup otherwise.
pub fn location_from_config(config: &Config) -> anyhow::Result<Arc<dyn LocationProvider>> {
    match config.fixed_location()? {
        Some(coordinate) => Ok(Arc::new(FixedLocationProvider::new(coordinate))),
        None => Ok(Arc::new(IpLocationProvider::new(config.ip_lookup_url(), config.timeout())?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::{Mock, MockServer, ResponseTemplate, matchers::method};

    const BERLIN_BY_IP: &str = r#"{"status":"success","city":"Berlin","lat":52.52,"lon":13.40}"#;

    #[derive(Debug, Default)]
    struct Chatty {
        stops: AtomicUsize,
    }

    impl LocationProvider for Chatty {
        fn start_updates(&self) -> LocationUpdates {
            let (tx, rx) = mpsc::unbounded_channel();
            let _ = tx.send(Ok(Coordinate::new(52.52, 13.40)));
            let _ = tx.send(Ok(Coordinate::new(48.85, 2.35)));
            let _ = tx.send(Err(LocationError::ServiceUnavailable));
            rx.into()
        }

        fn stop_updates(&self, _session: SessionId) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Debug)]
    struct Silent;

    impl LocationProvider for Silent {
        fn start_updates(&self) -> LocationUpdates {
            mpsc::unbounded_channel().1.into()
        }

        fn stop_updates(&self, _session: SessionId) {}
    }

    #[tokio::test]
    async fn first_fix_takes_first_and_stops() {
        let provider = Chatty::default();

        let fix = first_fix(&provider).await;

        assert_eq!(fix, Ok(Coordinate::new(52.52, 13.40)));
        assert_eq!(provider.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn closed_provider_is_unavailable() {
        assert_eq!(first_fix(&Silent).await, Err(LocationError::ServiceUnavailable));
    }

    #[tokio::test]
    async fn fixed_provider_reports_its_coordinate() {
        let provider = FixedLocationProvider::new(Coordinate::new(1.0, 2.0));
        assert_eq!(first_fix(&provider).await, Ok(Coordinate::new(1.0, 2.0)));
    }

    #[tokio::test]
    async fn ip_provider_parses_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(BERLIN_BY_IP))
            .mount(&server)
            .await;

        let provider =
            IpLocationProvider::new(server.uri(), Duration::from_secs(5)).expect("client builds");

        assert_eq!(first_fix(&provider).await, Ok(Coordinate::new(52.52, 13.40)));
    }

    #[tokio::test]
    async fn ip_provider_reports_failure_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"status":"fail","message":"private range"}"#),
            )
            .mount(&server)
            .await;

        let provider =
            IpLocationProvider::new(server.uri(), Duration::from_secs(5)).expect("client builds");

        assert_eq!(
            first_fix(&provider).await,
            Err(LocationError::Lookup("private range".into()))
        );
    }

    #[tokio::test]
    async fn overlapping_ip_lookups_both_get_a_fix() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(BERLIN_BY_IP)
                    .set_delay(Duration::from_millis(200)),
            )
            .mount(&server)
            .await;

        let provider = Arc::new(
            IpLocationProvider::new(server.uri(), Duration::from_secs(5)).expect("client builds"),
        );

        let earlier = {
            let provider = Arc::clone(&provider);
            tokio::spawn(async move { first_fix(provider.as_ref()).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        let later = first_fix(provider.as_ref()).await;
        let earlier = earlier.await.expect("lookup task completes");

        assert_eq!(later, Ok(Coordinate::new(52.52, 13.40)));
        assert_eq!(earlier, Ok(Coordinate::new(52.52, 13.40)));
    }

    #[tokio::test]
    async fn stopping_one_session_leaves_others_running() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(BERLIN_BY_IP)
                    .set_delay(Duration::from_millis(100)),
            )
            .mount(&server)
            .await;

        let provider =
            IpLocationProvider::new(server.uri(), Duration::from_secs(5)).expect("client builds");

        let mut stopped = provider.start_updates();
        let mut running = provider.start_updates();
        assert_ne!(stopped.session(), running.session());

        provider.stop_updates(stopped.session());

        assert_eq!(stopped.recv().await, None);
        assert_eq!(running.recv().await, Some(Ok(Coordinate::new(52.52, 13.40))));
    }

    #[test]
    fn config_with_coordinate_uses_fixed_provider() {
        let mut cfg = Config::default();
        cfg.set_fixed_location(Some(Coordinate::new(52.52, 13.40)));

        let provider = location_from_config(&cfg).expect("provider builds");
        assert!(format!("{provider:?}").contains("FixedLocationProvider"));
    }
}
