use clap::ValueEnum;

use crate::schema::{Color, Marker};
use crate::transform::Selector;

pub mod config;
pub mod dataset;
pub mod error;
pub mod report;
pub mod schema;
pub mod transform;

pub use error::{ReportError, Result};

/// Receipt lifecycle event, told apart by how many ADSes its update touches.
#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scenario {
    /// A receipt is issued; one ADS modified.
    Issued,
    /// A receipt is transferred between owners; two ADSes modified.
    Transferred,
    /// A receipt is loaned against; three ADSes modified.
    Loaned,
}

impl Scenario {
    pub const ALL: [Scenario; 3] = [Scenario::Issued, Scenario::Transferred, Scenario::Loaned];

    pub fn ads_modified(&self) -> u32 {
        match self {
            Scenario::Issued => 1,
            Scenario::Transferred => 2,
            Scenario::Loaned => 3,
        }
    }

    pub fn selector(&self) -> Selector {
        Selector::AdsModified(self.ads_modified())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::Issued => "issued",
            Scenario::Transferred => "transferred",
            Scenario::Loaned => "loaned",
        }
    }

    /// Issued receipts carry a single signature and are reported as measured;
    /// the other events are normalized to the configured signature count.
    pub fn normalizes_signatures(&self) -> bool {
        !matches!(self, Scenario::Issued)
    }

    pub(crate) fn color(&self) -> Color {
        match self {
            Scenario::Issued => Color::Red,
            Scenario::Transferred => Color::Blue,
            Scenario::Loaned => Color::Green,
        }
    }

    pub(crate) fn marker(&self) -> Marker {
        match self {
            Scenario::Issued => Marker::Triangle,
            Scenario::Transferred => Marker::Circle,
            Scenario::Loaned => Marker::Square,
        }
    }
}
