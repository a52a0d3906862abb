use serde::Deserialize;
use std::env;
use std::time::Duration;
use uuid::Uuid;

use kurier_core::analytics::{
    Attribution, ConversionsConfig, DispatcherConfig, MeasurementConfig,
};
use kurier_core::rate_limit::RateLimitConfig;
use kurier_core::scheduler::SchedulerConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Server settings
    pub server_host: String,
    pub server_port: u16,

    // Database settings
    pub database_url: Option<String>,

    // Admission control
    pub rate_limit_max_requests: u32,
    pub rate_limit_window_secs: u64,
    pub rate_limit_sweep_secs: u64,

    // Scheduler settings
    pub scheduler_interval_secs: u64,
    pub scheduler_startup_delay_secs: u64,
    pub default_assignee_id: Uuid,

    // Analytics settings
    pub ga_measurement_id: Option<String>,
    pub ga_api_secret: Option<String>,
    pub meta_pixel_id: Option<String>,
    pub meta_access_token: Option<String>,
    pub analytics_currency: String,
    pub analytics_set_price: f64,
    pub analytics_locale: Option<String>,
    pub analytics_region: Option<String>,
    pub analytics_campaign: Option<String>,
    pub dispatch_queue_capacity: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            server_host: env::var("SERVER_HOST")
                .unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(3000),

            database_url: env::var("DATABASE_URL").ok(),

            rate_limit_max_requests: env::var("RATE_LIMIT_MAX_REQUESTS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
            rate_limit_window_secs: env::var("RATE_LIMIT_WINDOW_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap_or(60),
            rate_limit_sweep_secs: env::var("RATE_LIMIT_SWEEP_SECS")
                .unwrap_or_else(|_| "120".to_string())
                .parse()
                .unwrap_or(120),

            scheduler_interval_secs: env::var("SCHEDULER_INTERVAL_SECS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()
                .unwrap_or(3600),
            scheduler_startup_delay_secs: env::var(
                "SCHEDULER_STARTUP_DELAY_SECS",
            )
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10),
            default_assignee_id: env::var("DEFAULT_ASSIGNEE_ID")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(Uuid::nil()),

            ga_measurement_id: env::var("GA_MEASUREMENT_ID").ok(),
            ga_api_secret: env::var("GA_API_SECRET").ok(),
            meta_pixel_id: env::var("META_PIXEL_ID").ok(),
            meta_access_token: env::var("META_ACCESS_TOKEN").ok(),
            analytics_currency: env::var("ANALYTICS_CURRENCY")
                .unwrap_or_else(|_| "EUR".to_string()),
            analytics_set_price: env::var("ANALYTICS_SET_PRICE")
                .unwrap_or_else(|_| "15.0".to_string())
                .parse()
                .unwrap_or(15.0),
            analytics_locale: env::var("ANALYTICS_LOCALE").ok(),
            analytics_region: env::var("ANALYTICS_REGION").ok(),
            analytics_campaign: env::var("ANALYTICS_CAMPAIGN").ok(),
            dispatch_queue_capacity: env::var("DISPATCH_QUEUE_CAPACITY")
                .unwrap_or_else(|_| "256".to_string())
                .parse()
                .unwrap_or(256),
        })
    }

    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            max_requests: self.rate_limit_max_requests,
            window: Duration::from_secs(self.rate_limit_window_secs),
        }
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            interval: Duration::from_secs(self.scheduler_interval_secs),
            startup_delay: Duration::from_secs(
                self.scheduler_startup_delay_secs,
            ),
            default_assignee: self.default_assignee_id,
            ..SchedulerConfig::default()
        }
    }

    pub fn dispatcher(&self) -> DispatcherConfig {
        DispatcherConfig {
            queue_capacity: self.dispatch_queue_capacity,
            currency: self.analytics_currency.clone(),
            set_price: self.analytics_set_price,
            attribution: Attribution {
                locale: self.analytics_locale.clone(),
                region: self.analytics_region.clone(),
                campaign: self.analytics_campaign.clone(),
            },
            ..DispatcherConfig::default()
        }
    }

    /// Measurement-protocol credentials; `None` disables the endpoint.
    pub fn measurement(&self) -> Option<MeasurementConfig> {
        match (&self.ga_measurement_id, &self.ga_api_secret) {
            (Some(measurement_id), Some(api_secret)) => {
                Some(MeasurementConfig {
                    measurement_id: measurement_id.clone(),
                    api_secret: api_secret.clone(),
                })
            }
            _ => None,
        }
    }

    /// Conversions-API credentials; `None` disables the endpoint.
    pub fn conversions(&self) -> Option<ConversionsConfig> {
        match (&self.meta_pixel_id, &self.meta_access_token) {
            (Some(pixel_id), Some(access_token)) => Some(ConversionsConfig {
                pixel_id: pixel_id.clone(),
                access_token: access_token.clone(),
            }),
            _ => None,
        }
    }
}
