//! How the host opens the checkout window.
//!
//! The checkout page learns what to book from its URL query string; the
//! window itself is centred on the screen with fixed size and no chrome.

use super::ChannelError;
use crate::config::WindowConfig;
use crate::types::{Performance, ScheduleId};
use serde::{Deserialize, Serialize};

/// Window chrome flags, always the same
pub const WINDOW_FEATURES: &str = "menubar=no,toolbar=no,location=no,status=no";

/// What the checkout window should book
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    /// Schedule to book
    pub schedule_id: ScheduleId,
    /// Display metadata
    pub performance: Performance,
}

impl CheckoutRequest {
    /// Query string carried by the launch URL
    #[must_use]
    pub fn query(&self) -> String {
        format!(
            "scheduleId={}&title={}&date={}&venue={}",
            self.schedule_id,
            urlencoding::encode(&self.performance.title),
            urlencoding::encode(&self.performance.date),
            urlencoding::encode(&self.performance.venue),
        )
    }

    /// Reads the request back from a launch URL, on the checkout side
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Malformed`] when `scheduleId` is missing or
    /// not a number, or a parameter is not valid percent-encoding.
    pub fn from_url(url: &str) -> Result<Self, ChannelError> {
        let query = url.split_once('?').map_or("", |(_, query)| query);
        let mut schedule_id = None;
        let mut performance = Performance::default();

        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let value = urlencoding::decode(value)
                .map_err(|error| ChannelError::Malformed(error.to_string()))?
                .into_owned();
            match key {
                "scheduleId" => {
                    let id = value.parse::<u64>().map_err(|_| {
                        ChannelError::Malformed(format!("invalid scheduleId {value:?}"))
                    })?;
                    schedule_id = Some(ScheduleId::new(id));
                },
                "title" => performance.title = value,
                "date" => performance.date = value,
                "venue" => performance.venue = value,
                _ => {},
            }
        }

        let schedule_id = schedule_id
            .ok_or_else(|| ChannelError::Malformed("missing scheduleId".to_string()))?;
        Ok(Self {
            schedule_id,
            performance,
        })
    }
}

/// Window size and position in screen pixels
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowGeometry {
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
    /// Distance from the left screen edge
    pub left: u32,
    /// Distance from the top screen edge
    pub top: u32,
}

impl WindowGeometry {
    /// Window of the configured size, centred on the configured screen
    #[must_use]
    pub const fn centered(config: &WindowConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            left: config.screen_width.saturating_sub(config.width) / 2,
            top: config.screen_height.saturating_sub(config.height) / 2,
        }
    }
}

/// Everything needed to open the checkout window
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchSpec {
    /// Page URL including the query string
    pub url: String,
    /// Size and position
    pub geometry: WindowGeometry,
    /// Chrome flags
    pub features: String,
}

impl LaunchSpec {
    /// Launch parameters for `request`
    #[must_use]
    pub fn new(request: &CheckoutRequest, config: &WindowConfig) -> Self {
        Self {
            url: format!("{}?{}", config.checkout_url, request.query()),
            geometry: WindowGeometry::centered(config),
            features: WINDOW_FEATURES.to_string(),
        }
    }

    /// Feature string in the form window-opening APIs expect
    #[must_use]
    pub fn window_features(&self) -> String {
        format!(
            "width={},height={},left={},top={},{}",
            self.geometry.width,
            self.geometry.height,
            self.geometry.left,
            self.geometry.top,
            self.features
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn request() -> CheckoutRequest {
        CheckoutRequest {
            schedule_id: ScheduleId::new(42),
            performance: Performance {
                title: "Spring Concert & Friends".to_string(),
                date: "2025-05-03 19:00".to_string(),
                venue: "Olympic Hall".to_string(),
            },
        }
    }

    #[test]
    fn url_carries_encoded_metadata() {
        let spec = LaunchSpec::new(&request(), &Config::default().window);
        assert_eq!(
            spec.url,
            "http://localhost:3000/booking/checkout?scheduleId=42\
             &title=Spring%20Concert%20%26%20Friends\
             &date=2025-05-03%2019%3A00&venue=Olympic%20Hall"
        );
    }

    #[test]
    fn window_is_centred_without_chrome() {
        let spec = LaunchSpec::new(&request(), &Config::default().window);
        assert_eq!(
            spec.geometry,
            WindowGeometry {
                width: 900,
                height: 780,
                left: 510,
                top: 150
            }
        );
        assert_eq!(
            spec.window_features(),
            "width=900,height=780,left=510,top=150,menubar=no,toolbar=no,location=no,status=no"
        );
    }

    #[test]
    fn checkout_side_reads_request_back() {
        let spec = LaunchSpec::new(&request(), &Config::default().window);
        assert_eq!(CheckoutRequest::from_url(&spec.url).unwrap(), request());
    }

    #[test]
    fn missing_schedule_is_malformed() {
        assert!(CheckoutRequest::from_url("http://localhost:3000/booking/checkout?title=x").is_err());
        assert!(CheckoutRequest::from_url("http://localhost:3000/booking/checkout?scheduleId=abc").is_err());
    }
}
