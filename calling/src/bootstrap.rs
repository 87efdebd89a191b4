//! Launch mode selection.
//!
//! A context starts either as the display (which hosts the authority) or as
//! a control panel (an agent only). The choice comes from a query-style
//! parameter such as `mode=CONTROL`; anything else means display.

use std::fmt;

/// How a context starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Waiting-room display: hosts the authority
    #[default]
    Display,
    /// Operator control panel: agent only
    Control,
}

impl Mode {
    /// Read the mode from a value such as `CONTROL` or `display`.
    #[must_use]
    pub fn from_value(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("control") {
            Self::Control
        } else {
            Self::Display
        }
    }

    /// Read the mode from a query string such as `?mode=CONTROL&x=1`.
    ///
    /// A bare value (`CONTROL`) is accepted too.
    #[must_use]
    pub fn from_query(query: &str) -> Self {
        let query = query.trim().trim_start_matches('?').trim_start_matches("--");
        if !query.contains('=') {
            return Self::from_value(query);
        }

        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| key.trim().eq_ignore_ascii_case("mode"))
            .map_or(Self::Display, |(_, value)| Self::from_value(value))
    }

    /// Whether this context hosts the authority.
    #[must_use]
    pub const fn hosts_authority(self) -> bool {
        matches!(self, Self::Display)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Display => f.write_str("DISPLAY"),
            Self::Control => f.write_str("CONTROL"),
        }
    }
}
