//! Optional free-text vehicle description (make, model, color, body type).
//!
//! Description is enrichment only. Every failure degrades to
//! `DESCRIPTION_UNAVAILABLE` and never holds up a decision.

use anyhow::Result;

use crate::frame::Frame;

/// Stored when no description could be obtained.
pub const DESCRIPTION_UNAVAILABLE: &str = "unavailable";

/// Prompt sent along with the vehicle image.
pub const DEFAULT_DESCRIPTION_PROMPT: &str = "Describe this vehicle briefly. Reply only with \
color, make, estimated model and body type (sedan/hatchback/SUV/truck), comma separated. \
Example: White, Toyota Corolla, Sedan.";

pub trait DescriptionService {
    fn name(&self) -> &'static str;

    fn describe(&mut self, vehicle: &Frame) -> Result<String>;
}

impl<D: DescriptionService + ?Sized> DescriptionService for Box<D> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn describe(&mut self, vehicle: &Frame) -> Result<String> {
        (**self).describe(vehicle)
    }
}

/// Used when no description endpoint is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnavailableDescriber;

impl DescriptionService for UnavailableDescriber {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn describe(&mut self, _vehicle: &Frame) -> Result<String> {
        Ok(DESCRIPTION_UNAVAILABLE.to_string())
    }
}

/// Ask the service, falling back to the sentinel on error or empty output.
pub fn describe_or_unavailable(service: &mut dyn DescriptionService, vehicle: &Frame) -> String {
    match service.describe(vehicle) {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => DESCRIPTION_UNAVAILABLE.to_string(),
        Err(e) => {
            log::warn!("vehicle description via {} failed: {:#}", service.name(), e);
            DESCRIPTION_UNAVAILABLE.to_string()
        }
    }
}

#[cfg(feature = "describe-http")]
pub use http::HttpDescriptionService;

#[cfg(feature = "describe-http")]
mod http {
    use anyhow::{anyhow, Context, Result};
    use serde::Deserialize;
    use std::time::Duration;

    use super::DescriptionService;
    use crate::frame::Frame;

    const JPEG_QUALITY: u8 = 85;

    #[derive(Deserialize)]
    struct DescriptionResponse {
        description: String,
    }

    /// Posts the vehicle crop as JPEG to a vision-language endpoint.
    ///
    /// The prompt travels in the `X-Description-Prompt` header. The endpoint
    /// answers either `{"description": "..."}` or plain text.
    pub struct HttpDescriptionService {
        agent: ureq::Agent,
        endpoint: String,
        prompt: String,
    }

    impl HttpDescriptionService {
        pub fn new(endpoint: &str, prompt: &str, timeout: Duration) -> Result<Self> {
            let parsed = url::Url::parse(endpoint)
                .with_context(|| format!("invalid description endpoint '{}'", endpoint))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(anyhow!("description endpoint must be an http(s) URL"));
            }
            let agent = ureq::AgentBuilder::new().timeout(timeout).build();
            Ok(Self {
                agent,
                endpoint: endpoint.to_string(),
                prompt: prompt.replace(['\r', '\n'], " "),
            })
        }
    }

    impl DescriptionService for HttpDescriptionService {
        fn name(&self) -> &'static str {
            "http"
        }

        fn describe(&mut self, vehicle: &Frame) -> Result<String> {
            let jpeg = vehicle.encode_jpeg(JPEG_QUALITY)?;
            let response = self
                .agent
                .post(&self.endpoint)
                .set("Content-Type", "image/jpeg")
                .set("X-Description-Prompt", &self.prompt)
                .send_bytes(&jpeg)
                .with_context(|| format!("post vehicle image to {}", self.endpoint))?;
            let body = response
                .into_string()
                .context("read description response")?;
            Ok(parse_description(&body))
        }
    }

    pub(super) fn parse_description(body: &str) -> String {
        match serde_json::from_str::<DescriptionResponse>(body) {
            Ok(parsed) => parsed.description.trim().to_string(),
            Err(_) => body.trim().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Rgb;
    use anyhow::anyhow;

    struct Failing;

    impl DescriptionService for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn describe(&mut self, _vehicle: &Frame) -> Result<String> {
            Err(anyhow!("connection refused"))
        }
    }

    struct Fixed(&'static str);

    impl DescriptionService for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn describe(&mut self, _vehicle: &Frame) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    fn vehicle() -> Frame {
        Frame::filled(4, 4, 0, Rgb(10, 10, 10)).unwrap()
    }

    #[test]
    fn failures_degrade_to_sentinel() {
        assert_eq!(describe_or_unavailable(&mut Failing, &vehicle()), DESCRIPTION_UNAVAILABLE);
        assert_eq!(describe_or_unavailable(&mut Fixed("  "), &vehicle()), DESCRIPTION_UNAVAILABLE);
        assert_eq!(
            describe_or_unavailable(&mut UnavailableDescriber, &vehicle()),
            DESCRIPTION_UNAVAILABLE
        );
    }

    #[test]
    fn description_is_trimmed() {
        assert_eq!(
            describe_or_unavailable(&mut Fixed(" White, Toyota Corolla, Sedan\n"), &vehicle()),
            "White, Toyota Corolla, Sedan"
        );
    }

    #[cfg(feature = "describe-http")]
    #[test]
    fn parses_json_or_plain_text() {
        assert_eq!(http::parse_description(r#"{"description": " Red, Fiat Egea, Sedan "}"#), "Red, Fiat Egea, Sedan");
        assert_eq!(http::parse_description("Black, Ford Transit, Van\n"), "Black, Ford Transit, Van");
    }

    #[cfg(feature = "describe-http")]
    #[test]
    fn rejects_non_http_endpoint() {
        let timeout = std::time::Duration::from_secs(1);
        assert!(HttpDescriptionService::new("ftp://vlm.local/describe", "p", timeout).is_err());
        assert!(HttpDescriptionService::new("not a url", "p", timeout).is_err());
        assert!(HttpDescriptionService::new("http://127.0.0.1:9/describe", "p", timeout).is_ok());
    }
}
