//! Sparse DATCOM parameter record extracted from user queries.
//!
//! The extraction model is instructed to return a strict JSON object with
//! `null` for anything the user did not state. Absent means "not specified";
//! nothing here is ever invented. Parsing tolerates code fences and prose
//! around the JSON object.

use serde::{Deserialize, Serialize};

use crate::error::ChatError;

/// Default angle-of-attack sweep when the user gives none: -2 to 10 deg in
/// 2-degree steps.
pub const DEFAULT_ALPHA_RANGE: (f64, f64, f64) = (-2.0, 10.0, 2.0);

/// All DATCOM parameters that may be extracted from a query.
///
/// Units are implicit per field: areas in ft², lengths and stations in
/// feet, angles in degrees, weight in pounds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatcomParams {
    /// Wing reference area (S).
    #[serde(default, rename = "wing_S")]
    pub wing_s: Option<f64>,
    /// Wing aspect ratio (A).
    #[serde(default, rename = "wing_A")]
    pub wing_a: Option<f64>,
    /// Wing taper ratio (lambda).
    #[serde(default, rename = "wing_lambda")]
    pub wing_taper: Option<f64>,
    /// Wing quarter-chord sweep angle.
    #[serde(default, rename = "wing_sweep_angle")]
    pub wing_sweep: Option<f64>,
    /// Wing NACA airfoil designation.
    #[serde(default)]
    pub wing_airfoil: Option<String>,
    /// Wing dihedral angle.
    #[serde(default)]
    pub wing_dihedral: Option<f64>,
    /// Wing twist angle (negative for washout).
    #[serde(default)]
    pub wing_twist: Option<f64>,

    /// Horizontal tail area.
    #[serde(default, rename = "htail_S")]
    pub htail_s: Option<f64>,
    /// Horizontal tail aspect ratio.
    #[serde(default, rename = "htail_A")]
    pub htail_a: Option<f64>,
    /// Horizontal tail taper ratio.
    #[serde(default, rename = "htail_lambda")]
    pub htail_taper: Option<f64>,
    /// Horizontal tail sweep angle.
    #[serde(default, rename = "htail_sweep_angle")]
    pub htail_sweep: Option<f64>,

    /// Vertical tail area.
    #[serde(default, rename = "vtail_S")]
    pub vtail_s: Option<f64>,
    /// Vertical tail aspect ratio.
    #[serde(default, rename = "vtail_A")]
    pub vtail_a: Option<f64>,
    /// Vertical tail taper ratio.
    #[serde(default, rename = "vtail_lambda")]
    pub vtail_taper: Option<f64>,
    /// Vertical tail sweep angle.
    #[serde(default, rename = "vtail_sweep_angle")]
    pub vtail_sweep: Option<f64>,

    /// Mach numbers for analysis.
    #[serde(default)]
    pub mach_numbers: Option<Vec<f64>>,
    /// Altitudes in feet.
    #[serde(default)]
    pub altitudes: Option<Vec<f64>>,
    /// Explicit angle-of-attack list in degrees.
    #[serde(default)]
    pub alpha_degrees: Option<Vec<f64>>,
    /// Aircraft weight in pounds.
    #[serde(default)]
    pub weight: Option<f64>,

    /// Fuselage length.
    #[serde(default)]
    pub body_length: Option<f64>,
    /// Fuselage maximum diameter.
    #[serde(default)]
    pub body_max_diameter: Option<f64>,

    /// Center of gravity X-station.
    #[serde(default)]
    pub xcg: Option<f64>,
    /// Wing apex X-station.
    #[serde(default)]
    pub xw: Option<f64>,
    /// Horizontal tail X-station.
    #[serde(default)]
    pub xh: Option<f64>,
    /// Vertical tail X-station.
    #[serde(default)]
    pub xv: Option<f64>,
}

impl DatcomParams {
    /// Names of gate-required fields that are missing from this record.
    ///
    /// The gate requires the full wing block plus at least one Mach and one
    /// altitude. The alpha sweep is defaultable and never gates.
    #[must_use]
    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.wing_s.is_none() {
            missing.push("wing_S (機翼面積)");
        }
        if self.wing_a.is_none() {
            missing.push("wing_A (展弦比)");
        }
        if self.wing_taper.is_none() {
            missing.push("wing_lambda (梯形比)");
        }
        if self.wing_sweep.is_none() {
            missing.push("wing_sweep_angle (後掠角)");
        }
        if self.mach_numbers.as_ref().is_none_or(Vec::is_empty) {
            missing.push("mach_numbers (馬赫數)");
        }
        if self.altitudes.as_ref().is_none_or(Vec::is_empty) {
            missing.push("altitudes (高度)");
        }
        missing
    }

    /// Resolves the angle-of-attack range.
    ///
    /// An explicit alpha list is converted to `(start, end, step)` using the
    /// sorted endpoints and the first gap as the step; a singleton becomes a
    /// one-point range. With no list at all, the documented default sweep is
    /// used and `true` is returned in the second slot.
    #[must_use]
    pub fn alpha_range(&self) -> ((f64, f64, f64), bool) {
        match self.alpha_degrees.as_deref() {
            Some([]) | None => (DEFAULT_ALPHA_RANGE, true),
            Some([single]) => ((*single, *single, 1.0), false),
            Some(values) => {
                let mut sorted = values.to_vec();
                sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                let start = sorted[0];
                let end = sorted[sorted.len() - 1];
                let step = (sorted[1] - sorted[0]).abs().max(f64::EPSILON);
                ((start, end, step), false)
            }
        }
    }

    /// Whether explicit body data is present.
    #[must_use]
    pub fn has_body(&self) -> bool {
        self.body_length.is_some() && self.body_max_diameter.is_some()
    }
}

/// Parses the extraction model's reply into a [`DatcomParams`].
///
/// Strips markdown code fences, slices from the first `{` to the last `}`,
/// and deserializes with unknown fields ignored and `null` mapping to
/// absent.
///
/// # Errors
///
/// Returns [`ChatError::ResponseParse`] when no JSON object is present or
/// the object does not deserialize.
pub fn parse_extraction(content: &str) -> Result<DatcomParams, ChatError> {
    let trimmed = content.trim();
    let cleaned = if trimmed.starts_with("```") {
        trimmed
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim()
    } else {
        trimmed
    };

    let start = cleaned.find('{');
    let end = cleaned.rfind('}');
    let (Some(start), Some(end)) = (start, end) else {
        return Err(ChatError::ResponseParse {
            message: format!(
                "no JSON object in extraction reply ({} bytes)",
                content.len()
            ),
        });
    };
    if end < start {
        return Err(ChatError::ResponseParse {
            message: "malformed JSON object in extraction reply".to_string(),
        });
    }

    serde_json::from_str(&cleaned[start..=end]).map_err(|e| ChatError::ResponseParse {
        message: format!("extraction JSON did not deserialize: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_record() {
        let json = r#"{
            "wing_S": 530, "wing_A": 2.8, "wing_lambda": 0.3, "wing_sweep_angle": 45,
            "mach_numbers": [0.8], "altitudes": [10000],
            "alpha_degrees": [-2, 10, 2], "weight": 40000,
            "body_length": 63, "body_max_diameter": 3,
            "xcg": 25, "xw": 18.5, "xh": 49
        }"#;
        let params = parse_extraction(json).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(params.wing_s, Some(530.0));
        assert_eq!(params.wing_sweep, Some(45.0));
        assert_eq!(params.mach_numbers.as_deref(), Some(&[0.8][..]));
        assert_eq!(params.xh, Some(49.0));
        assert!(params.missing_required().is_empty());
    }

    #[test]
    fn test_parse_nulls_become_absent() {
        let json = r#"{"wing_S": 50, "wing_A": null, "weight": null}"#;
        let params = parse_extraction(json).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(params.wing_s, Some(50.0));
        assert!(params.wing_a.is_none());
        assert!(params.weight.is_none());
    }

    #[test]
    fn test_parse_code_fence_and_prose() {
        let content = "Here you go:\n```json\n{\"wing_S\": 100}\n```";
        let params = parse_extraction(content).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(params.wing_s, Some(100.0));
    }

    #[test]
    fn test_parse_rejects_no_json() {
        let err = parse_extraction("I could not find any parameters.").unwrap_err();
        assert!(err.to_string().contains("no JSON object"));
    }

    #[test]
    fn test_missing_required_names_fields() {
        let params = DatcomParams::default();
        let missing = params.missing_required();
        assert_eq!(missing.len(), 6);
        assert!(missing.iter().any(|m| m.contains("wing_S")));
        assert!(missing.iter().any(|m| m.contains("mach_numbers")));
    }

    #[test]
    fn test_alpha_range_from_list() {
        let params = DatcomParams {
            alpha_degrees: Some(vec![10.0, -2.0, 0.0, 2.0, 4.0, 6.0, 8.0]),
            ..DatcomParams::default()
        };
        let ((start, end, step), defaulted) = params.alpha_range();
        assert!((start + 2.0).abs() < 1e-9);
        assert!((end - 10.0).abs() < 1e-9);
        assert!((step - 2.0).abs() < 1e-9);
        assert!(!defaulted);
    }

    #[test]
    fn test_alpha_range_singleton() {
        let params = DatcomParams {
            alpha_degrees: Some(vec![4.0]),
            ..DatcomParams::default()
        };
        let ((start, end, step), defaulted) = params.alpha_range();
        assert!((start - 4.0).abs() < 1e-9);
        assert!((end - 4.0).abs() < 1e-9);
        assert!((step - 1.0).abs() < 1e-9);
        assert!(!defaulted);
    }

    #[test]
    fn test_alpha_range_default() {
        let params = DatcomParams::default();
        let (range, defaulted) = params.alpha_range();
        assert_eq!(range, DEFAULT_ALPHA_RANGE);
        assert!(defaulted);
    }
}
