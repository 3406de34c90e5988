use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The Tradovate deployment an account's credentials belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum BrokerEnvironment {
    #[default]
    Demo,
    Live,
}

impl BrokerEnvironment {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrokerEnvironment::Demo => "demo",
            BrokerEnvironment::Live => "live",
        }
    }

    /// The provenance label stamped on trades imported from this environment.
    pub fn source_label(&self) -> String {
        format!("tradovate_{}", self.as_str())
    }
}

impl fmt::Display for BrokerEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BrokerEnvironment {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "demo" => Ok(BrokerEnvironment::Demo),
            "live" => Ok(BrokerEnvironment::Live),
            other => Err(CoreError::InvalidInput(
                "environment".to_string(),
                format!("'{other}' must be demo or live"),
            )),
        }
    }
}

/// UI colour scheme preference stored per account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl FromStr for Theme {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dark" => Ok(Theme::Dark),
            "light" => Ok(Theme::Light),
            other => Err(CoreError::InvalidInput(
                "theme".to_string(),
                format!("'{other}' must be dark or light"),
            )),
        }
    }
}
