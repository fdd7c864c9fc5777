//! Transforms from normalized control travel to port values.

use pedalera_catalog::{PortDescriptor, PortFlags, ScalePoint};
use serde::{Deserialize, Serialize};

/// Maps normalized control travel (0.0 to 1.0) onto an addressed range.
///
/// The transform is fixed when a control is addressed, normally derived from
/// the port's declared flags via [`for_port`](Self::for_port), and travels
/// with the addressing so the same hardware position always resolves to the
/// same value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Transform {
    /// Equal value change per unit of travel.
    #[default]
    Linear,
    /// Equal ratio per unit of travel. Needs a strictly positive range.
    Logarithmic,
    /// Travel split into equal steps, one per scale point.
    Enumerated {
        /// Selectable points in declared order.
        points: Vec<ScalePoint>,
    },
}

impl Transform {
    /// Picks the natural transform for a port from its declared flags.
    ///
    /// Enumerated ports map over their scale points and toggles become a
    /// two-point off/on enumeration. Logarithmic ports get the equal-ratio
    /// map. Everything else is linear.
    pub fn for_port(port: &PortDescriptor) -> Self {
        if port.flags.contains(PortFlags::ENUMERATED) && !port.scale_points.is_empty() {
            return Self::Enumerated {
                points: port.scale_points.clone(),
            };
        }
        if port.flags.contains(PortFlags::TOGGLED) {
            if let Some(range) = port.range {
                return Self::Enumerated {
                    points: vec![
                        ScalePoint::new("Off", range.min),
                        ScalePoint::new("On", range.max),
                    ],
                };
            }
        }
        if port.flags.contains(PortFlags::LOGARITHMIC) {
            return Self::Logarithmic;
        }
        Self::Linear
    }

    /// Resolves clamped travel in `[0.0, 1.0]` against the addressed range.
    ///
    /// `min` and `max` are the addressed bounds. Enumerated transforms ignore
    /// them and select among their points instead.
    pub fn apply(&self, min: f32, max: f32, travel: f32) -> f32 {
        let travel = travel.clamp(0.0, 1.0);
        match self {
            Self::Linear => min + travel * (max - min),
            Self::Logarithmic => {
                // Nonpositive ranges are rejected at address time.
                if min <= 0.0 {
                    return min;
                }
                min * (max / min).powf(travel)
            }
            Self::Enumerated { points } => match points.len() {
                0 => min,
                1 => points[0].value,
                n => {
                    let last = (n - 1) as f32;
                    let idx = (travel * last).round() as usize;
                    points[idx.min(n - 1)].value
                }
            },
        }
    }
}
