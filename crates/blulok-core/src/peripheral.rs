//! Discovered peripherals.
//!
//! The platform owns the actual connection handle; this layer only ever
//! refers to a peripheral by its stable [`PeripheralId`].

use std::fmt;

use serde::Serialize;

/// Opaque, platform-stable peripheral identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PeripheralId(String);

impl PeripheralId {
    /// Wrap a platform identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeripheralId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeripheralId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for PeripheralId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// One raw advertisement report from the radio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    /// Advertising peripheral.
    pub id: PeripheralId,
    /// Advertised local name. `None` if the peripheral advertised no name.
    pub name: Option<String>,
    /// Received signal strength in dBm.
    pub rssi: i16,
}

impl Advertisement {
    /// Advertisement carrying a name.
    pub fn new(id: impl Into<PeripheralId>, name: impl Into<String>, rssi: i16) -> Self {
        Self { id: id.into(), name: Some(name.into()), rssi }
    }
}

/// Directory entry for a discovered accessory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeripheralRecord {
    /// Stable identifier, unique within a directory.
    pub id: PeripheralId,
    /// Last non-placeholder advertised name.
    pub display_name: String,
    /// Last reported signal strength in dBm.
    pub rssi: i16,
}

impl PeripheralRecord {
    /// Coarse signal quality for display.
    pub fn signal_quality(&self) -> SignalQuality {
        SignalQuality::from_rssi(self.rssi)
    }

    /// Case-insensitive match against name or identifier.
    pub fn matches(&self, query: &str) -> bool {
        if query.is_empty() {
            return true;
        }
        let query = query.to_lowercase();
        self.display_name.to_lowercase().contains(&query)
            || self.id.as_str().to_lowercase().contains(&query)
    }
}

/// Signal strength buckets shown next to each discovered lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SignalQuality {
    /// |rssi| <= 55
    Excellent,
    /// |rssi| <= 70
    Good,
    /// |rssi| <= 85
    Fair,
    /// Anything weaker.
    Weak,
}

impl SignalQuality {
    /// Bucket a dBm reading.
    pub fn from_rssi(rssi: i16) -> Self {
        match rssi.unsigned_abs() {
            0..=55 => Self::Excellent,
            56..=70 => Self::Good,
            71..=85 => Self::Fair,
            _ => Self::Weak,
        }
    }

    /// Display label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Weak => "Weak",
        }
    }
}
