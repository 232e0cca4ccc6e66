use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

use crate::{
    Config, ServiceError,
    gateway::openweather::OpenWeatherGateway,
    model::{Coordinate, LookupRequest, WeatherResult},
};

pub mod openweather;

/// Performs one weather lookup per call and completes exactly once.
#[async_trait]
pub trait WeatherGateway: Send + Sync + Debug {
    async fn fetch_by_city(&self, name: &str) -> Result<WeatherResult, ServiceError>;

    async fn fetch_by_coordinate(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<WeatherResult, ServiceError>;

    async fn fetch(&self, request: &LookupRequest) -> Result<WeatherResult, ServiceError> {
        match request {
            LookupRequest::ByCity(name) => self.fetch_by_city(name).await,
            LookupRequest::ByCoordinate(Coordinate { latitude, longitude }) => {
                self.fetch_by_coordinate(*latitude, *longitude).await
            }
        }
    }
}

/// Construct the OpenWeather gateway from config.
pub fn gateway_from_config(config: &Config) -> anyhow::Result<Arc<dyn WeatherGateway>> {
    let api_key = config.api_key()?;
    let gateway = OpenWeatherGateway::new(api_key, config.base_url(), config.timeout())?;
    Ok(Arc::new(gateway))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct Echo {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl WeatherGateway for Echo {
        async fn fetch_by_city(&self, name: &str) -> Result<WeatherResult, ServiceError> {
            self.calls.lock().unwrap().push(format!("city:{name}"));
            Err(ServiceError::NetworkFailure("offline".into()))
        }

        async fn fetch_by_coordinate(
            &self,
            latitude: f64,
            longitude: f64,
        ) -> Result<WeatherResult, ServiceError> {
            self.calls.lock().unwrap().push(format!("coord:{latitude},{longitude}"));
            Err(ServiceError::NetworkFailure("offline".into()))
        }
    }

    #[tokio::test]
    async fn fetch_routes_each_request_kind() {
        let gw = Echo::default();

        let _ = gw.fetch(&LookupRequest::ByCity("Oslo".into())).await;
        let _ = gw.fetch(&LookupRequest::ByCoordinate(Coordinate::new(52.52, 13.4))).await;

        assert_eq!(*gw.calls.lock().unwrap(), vec!["city:Oslo", "coord:52.52,13.4"]);
    }

    #[test]
    fn gateway_from_config_errors_when_missing_api_key() {
        if std::env::var(crate::config::API_KEY_ENV).is_ok() {
            return;
        }
        let err = gateway_from_config(&Config::default()).unwrap_err();
        assert!(err.to_string().contains("No OpenWeather API key configured"));
    }

    #[test]
    fn gateway_from_config_works_when_configured() {
        let mut cfg = Config::default();
        cfg.set_api_key("KEY".into());

        assert!(gateway_from_config(&cfg).is_ok());
    }
}
