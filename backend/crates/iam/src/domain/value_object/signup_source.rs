//! Sign-up Source
//!
//! The client a user signed up from decides how the confirmation secret is
//! delivered: a long token in a link for browsers, a short numeric code
//! that can be typed on a phone.

use std::fmt;
use std::str::FromStr;

use crate::error::IamError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignupSource {
    Web,
    Android,
    Ios,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationChannel {
    /// Clickable link embedding a long random token
    Link,
    /// Six digit code
    Code,
}

impl SignupSource {
    pub const fn code(&self) -> &'static str {
        match self {
            SignupSource::Web => "web",
            SignupSource::Android => "android",
            SignupSource::Ios => "ios",
        }
    }

    pub const fn channel(&self) -> ConfirmationChannel {
        match self {
            SignupSource::Web => ConfirmationChannel::Link,
            SignupSource::Android | SignupSource::Ios => ConfirmationChannel::Code,
        }
    }

    /// Human label used in mail titles
    pub const fn label(&self) -> &'static str {
        match self {
            SignupSource::Web => "Web",
            SignupSource::Android => "Android",
            SignupSource::Ios => "iOS",
        }
    }
}

impl FromStr for SignupSource {
    type Err = IamError;

    fn from_str(s: &str) -> Result<Self, IamError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "web" => Ok(SignupSource::Web),
            "android" => Ok(SignupSource::Android),
            "ios" => Ok(SignupSource::Ios),
            "" => Err(IamError::InvalidInput("source is required".into())),
            other => Err(IamError::InvalidInput(format!(
                "unsupported source: {other}"
            ))),
        }
    }
}

impl fmt::Display for SignupSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
