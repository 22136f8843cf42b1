use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::RollcallError;

/// The named views the router can switch between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    Dashboard,
    Register,
    Capture,
    Review,
}

impl View {
    pub const ALL: [View; 4] = [View::Dashboard, View::Register, View::Capture, View::Review];

    pub fn as_str(self) -> &'static str {
        match self {
            View::Dashboard => "dashboard",
            View::Register => "register",
            View::Capture => "capture",
            View::Review => "review",
        }
    }
}

impl Default for View {
    fn default() -> Self {
        View::Dashboard
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for View {
    type Err = RollcallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        View::ALL
            .into_iter()
            .find(|view| view.as_str() == s)
            .ok_or_else(|| RollcallError::Validation(format!("unknown view: {s}")))
    }
}

/// How registration photos are being collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PhotoMode {
    #[default]
    Camera,
    Upload,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_view_names() {
        assert_eq!("review".parse::<View>().expect("parse"), View::Review);
        assert!("settings".parse::<View>().is_err());
    }
}
