//! Conversions from engineering parameters to DATCOM namelist fields.
//!
//! Each conversion mirrors one registry tool: wing and tail planforms
//! (`WGPLNF`/`HTPLNF`/`VTPLNF`), synthesis positions (`SYNTHS`),
//! axisymmetric body geometry (`BODY`), the flight-condition matrix
//! (`FLTCON`), and the cross-field validation report. Values stay at full
//! precision; the JSON observations round for readability and the namelist
//! renderer rounds on output.

use serde::Serialize;
use serde_json::json;

use crate::datcom::geometry::{self, Planform};
use crate::datcom::namelist::Namelist;
use crate::error::ToolError;

/// DATCOM limit on angles of attack per case.
pub const MAX_ALPHA_COUNT: usize = 20;
/// DATCOM limit on total analysis points (`NMACH * NALT * NALPHA`).
pub const MAX_ANALYSIS_POINTS: usize = 400;
/// DATCOM limit on fuselage stations.
pub const MAX_BODY_STATIONS: usize = 20;

/// Default wing airfoil designation.
const DEFAULT_WING_AIRFOIL: &str = "2412";
/// Default tail airfoil designation.
const DEFAULT_TAIL_AIRFOIL: &str = "0012";

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

fn invalid(name: &str, message: impl Into<String>) -> ToolError {
    ToolError::InvalidArguments {
        name: name.to_string(),
        message: message.into(),
    }
}

/// A converted lifting surface (wing, horizontal tail, or vertical tail).
#[derive(Debug, Clone)]
pub struct SurfaceConversion {
    /// Target namelist: `WGPLNF`, `HTPLNF`, or `VTPLNF`.
    pub namelist: &'static str,
    /// Derived planform dimensions.
    pub planform: Planform,
    /// Reference area.
    pub area: f64,
    /// Sweep angle at the measurement station (degrees).
    pub sweep: f64,
    /// Chordwise sweep measurement station (fraction of chord).
    pub sweep_location: f64,
    /// Dihedral angle (degrees).
    pub dihedral: f64,
    /// Twist angle (degrees).
    pub twist: f64,
    /// Airfoil card printed before the block (e.g., `NACA-W-4-2412`).
    pub airfoil_card: String,
}

impl SurfaceConversion {
    /// Renders this surface as its namelist block.
    #[must_use]
    pub fn to_namelist(&self) -> Namelist {
        let mut nl = Namelist::new(self.namelist);
        nl.leading_card = Some(self.airfoil_card.clone());
        nl.push_real("CHRDTP", self.planform.tip_chord);
        nl.push_real("SSPNE", self.planform.semi_span);
        nl.push_real("SSPN", self.planform.semi_span);
        nl.push_real("CHRDR", self.planform.root_chord);
        nl.push_real("SAVSI", self.sweep);
        nl.push_real("CHSTAT", self.sweep_location);
        nl.push_real("TWISTA", self.twist);
        nl.push_real("DHDADI", self.dihedral);
        nl.push_real("TYPE", 1.0);
        nl
    }

    /// JSON observation for tool callers.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "CHRDR": round4(self.planform.root_chord),
            "CHRDTP": round4(self.planform.tip_chord),
            "SSPN": round4(self.planform.semi_span),
            "SSPNE": round4(self.planform.semi_span),
            "SAVSI": self.sweep,
            "CHSTAT": self.sweep_location,
            "TYPE": 1.0,
            "DHDADI": self.dihedral,
            "TWISTA": self.twist,
            "airfoil": self.airfoil_card,
            "SREF": round4(self.area),
            "MAC": round4(self.planform.mac),
            "span": round4(self.planform.span),
        })
    }
}

fn check_surface(name: &str, area: f64, aspect_ratio: f64, taper: f64) -> Result<(), ToolError> {
    if area <= 0.0 || aspect_ratio <= 0.0 {
        return Err(invalid(
            name,
            "area (S) and aspect ratio (A) must be greater than 0",
        ));
    }
    if !(0.0..=1.0).contains(&taper) {
        return Err(invalid(
            name,
            format!("taper ratio (lambda) must be between 0 and 1, got {taper}"),
        ));
    }
    Ok(())
}

/// Converts wing geometry to `WGPLNF` fields.
///
/// # Errors
///
/// Returns [`ToolError::InvalidArguments`] for non-positive area or aspect
/// ratio, or a taper ratio outside `[0, 1]`.
pub fn convert_wing(
    area: f64,
    aspect_ratio: f64,
    taper: f64,
    sweep: f64,
    airfoil: Option<&str>,
    dihedral: f64,
    twist: f64,
    sweep_location: f64,
) -> Result<SurfaceConversion, ToolError> {
    check_surface("convert_wing_to_datcom", area, aspect_ratio, taper)?;
    Ok(SurfaceConversion {
        namelist: "WGPLNF",
        planform: geometry::planform(area, aspect_ratio, taper),
        area,
        sweep,
        sweep_location,
        dihedral,
        twist,
        airfoil_card: format!("NACA-W-4-{}", airfoil.unwrap_or(DEFAULT_WING_AIRFOIL)),
    })
}

/// Converts tail geometry to `HTPLNF` or `VTPLNF` fields.
///
/// The same planform math as the wing; `is_vertical` selects the namelist
/// and the airfoil prefix.
///
/// # Errors
///
/// Returns [`ToolError::InvalidArguments`] as for [`convert_wing`].
pub fn convert_tail(
    area: f64,
    aspect_ratio: f64,
    taper: f64,
    sweep: f64,
    airfoil: Option<&str>,
    is_vertical: bool,
) -> Result<SurfaceConversion, ToolError> {
    check_surface("convert_tail_to_datcom", area, aspect_ratio, taper)?;
    let (namelist, prefix) = if is_vertical {
        ("VTPLNF", "V")
    } else {
        ("HTPLNF", "H")
    };
    Ok(SurfaceConversion {
        namelist,
        planform: geometry::planform(area, aspect_ratio, taper),
        area,
        sweep,
        sweep_location: 0.0,
        dihedral: 0.0,
        twist: 0.0,
        airfoil_card: format!(
            "NACA-{prefix}-4-{}",
            airfoil.unwrap_or(DEFAULT_TAIL_AIRFOIL)
        ),
    })
}

/// Component stations for the `SYNTHS` namelist.
#[derive(Debug, Clone, Serialize)]
pub struct SynthsConversion {
    /// Center of gravity X-station.
    #[serde(rename = "XCG")]
    pub xcg: f64,
    /// Center of gravity Z-station.
    #[serde(rename = "ZCG")]
    pub zcg: f64,
    /// Wing apex X-station.
    #[serde(rename = "XW")]
    pub xw: f64,
    /// Wing apex Z-station.
    #[serde(rename = "ZW")]
    pub zw: f64,
    /// Wing incidence angle (degrees).
    #[serde(rename = "ALIW")]
    pub aliw: f64,
    /// Horizontal tail X-station.
    #[serde(rename = "XH")]
    pub xh: f64,
    /// Horizontal tail Z-station.
    #[serde(rename = "ZH")]
    pub zh: f64,
    /// Horizontal tail incidence angle (degrees).
    #[serde(rename = "ALIH")]
    pub alih: f64,
    /// Vertical tail X-station.
    #[serde(rename = "XV")]
    pub xv: f64,
    /// Vertical tail Z-station.
    #[serde(rename = "ZV")]
    pub zv: f64,
}

impl SynthsConversion {
    /// Renders the `SYNTHS` block.
    #[must_use]
    pub fn to_namelist(&self) -> Namelist {
        let mut nl = Namelist::new("SYNTHS");
        nl.push_real("XCG", self.xcg);
        nl.push_real("ZCG", self.zcg);
        nl.push_real("XW", self.xw);
        nl.push_real("ZW", self.zw);
        nl.push_real("ALIW", self.aliw);
        nl.push_real("XH", self.xh);
        nl.push_real("ZH", self.zh);
        nl.push_real("ALIH", self.alih);
        nl.push_real("XV", self.xv);
        nl.push_real("ZV", self.zv);
        nl
    }
}

/// Computes component X,Z stations from fuselage length and positional
/// fractions.
///
/// # Errors
///
/// Returns [`ToolError::InvalidArguments`] for a non-positive fuselage
/// length or fractions outside `[0, 1]`.
#[allow(clippy::too_many_arguments)]
pub fn synthesis_positions(
    fuselage_length: f64,
    wing_pct: f64,
    htail_pct: f64,
    vtail_pct: f64,
    cg_pct: f64,
    wing_z: f64,
    htail_z: f64,
    vtail_z: f64,
) -> Result<SynthsConversion, ToolError> {
    const NAME: &str = "calculate_synthesis_positions";
    if fuselage_length <= 0.0 {
        return Err(invalid(NAME, "fuselage length must be greater than 0"));
    }
    for (label, pct) in [
        ("wing", wing_pct),
        ("htail", htail_pct),
        ("vtail", vtail_pct),
        ("cg", cg_pct),
    ] {
        if !(0.0..=1.0).contains(&pct) {
            return Err(invalid(
                NAME,
                format!("{label} position fraction must be within [0, 1], got {pct}"),
            ));
        }
    }

    Ok(SynthsConversion {
        xcg: fuselage_length * cg_pct,
        zcg: 0.0,
        xw: fuselage_length * wing_pct,
        zw: wing_z,
        aliw: 1.0,
        xh: fuselage_length * htail_pct,
        zh: htail_z,
        alih: 0.0,
        xv: fuselage_length * vtail_pct,
        zv: vtail_z,
    })
}

/// Axisymmetric body stations for the `BODY` namelist.
#[derive(Debug, Clone, Serialize)]
pub struct BodyConversion {
    /// Number of stations.
    #[serde(rename = "NX")]
    pub nx: f64,
    /// Longitudinal station coordinates.
    #[serde(rename = "X")]
    pub x: Vec<f64>,
    /// Radius at each station.
    #[serde(rename = "R")]
    pub r: Vec<f64>,
    /// Cross-section area at each station (`pi * r^2`).
    #[serde(rename = "S")]
    pub s: Vec<f64>,
}

impl BodyConversion {
    /// Renders the `BODY` block.
    #[must_use]
    pub fn to_namelist(&self) -> Namelist {
        let mut nl = Namelist::new("BODY");
        nl.push_real("NX", self.nx);
        nl.push_array("X", self.x.clone());
        nl.push_array("R", self.r.clone());
        nl.push_array("S", self.s.clone());
        nl
    }
}

/// Generates axisymmetric body stations: a linear nose cone, a constant
/// mid-section, and a linear boattail.
///
/// # Errors
///
/// Returns [`ToolError::InvalidArguments`] for non-positive dimensions, a
/// nose+tail longer than the body, or a station count outside `[2, 20]`.
pub fn body_geometry(
    length: f64,
    max_diameter: f64,
    nose_length: Option<f64>,
    tail_length: Option<f64>,
    n_stations: Option<usize>,
) -> Result<BodyConversion, ToolError> {
    const NAME: &str = "define_body_geometry";
    if length <= 0.0 || max_diameter <= 0.0 {
        return Err(invalid(NAME, "length and diameter must be greater than 0"));
    }
    // Nose and boattail default to 20% of the body each.
    let nose = nose_length.unwrap_or(length * 0.2);
    let tail = tail_length.unwrap_or(length * 0.2);
    if nose < 0.0 || tail < 0.0 || nose + tail > length {
        return Err(invalid(
            NAME,
            format!("nose ({nose}) + tail ({tail}) must fit within the body length ({length})"),
        ));
    }
    let n = n_stations.unwrap_or(10);
    if !(2..=MAX_BODY_STATIONS).contains(&n) {
        return Err(invalid(
            NAME,
            format!("station count must be within [2, {MAX_BODY_STATIONS}], got {n}"),
        ));
    }

    let radius_max = max_diameter / 2.0;
    let mut x = Vec::with_capacity(n);
    let mut r = Vec::with_capacity(n);
    let mut s = Vec::with_capacity(n);
    for i in 0..n {
        let station = length * (i as f64) / ((n - 1) as f64);
        let radius = if nose > 0.0 && station < nose {
            radius_max * (station / nose)
        } else if tail > 0.0 && station > length - tail {
            radius_max * ((length - station) / tail)
        } else {
            radius_max
        };
        x.push(station);
        r.push(radius);
        s.push(std::f64::consts::PI * radius * radius);
    }

    Ok(BodyConversion {
        nx: n as f64,
        x,
        r,
        s,
    })
}

/// The flight-condition matrix for the `FLTCON` namelist.
#[derive(Debug, Clone, Serialize)]
pub struct FltconConversion {
    /// Mach numbers.
    #[serde(rename = "MACH")]
    pub machs: Vec<f64>,
    /// Altitudes in feet.
    #[serde(rename = "ALT")]
    pub altitudes: Vec<f64>,
    /// Angle-of-attack schedule in degrees.
    #[serde(rename = "ALSCHD")]
    pub alpha_schedule: Vec<f64>,
    /// Aircraft weight in pounds.
    #[serde(rename = "WT")]
    pub weight: f64,
    /// Loop mode (2.0 = Mach-priority).
    #[serde(rename = "LOOP")]
    pub loop_mode: f64,
}

impl FltconConversion {
    /// Total analysis points: `NMACH * NALT * NALPHA`.
    #[must_use]
    pub fn analysis_points(&self) -> usize {
        self.machs.len() * self.altitudes.len() * self.alpha_schedule.len()
    }

    /// Renders the `FLTCON` block.
    #[must_use]
    pub fn to_namelist(&self) -> Namelist {
        let mut nl = Namelist::new("FLTCON");
        nl.push_real("NMACH", self.machs.len() as f64);
        nl.push_array("MACH", self.machs.clone());
        nl.push_real("NALT", self.altitudes.len() as f64);
        nl.push_array("ALT", self.altitudes.clone());
        nl.push_real("NALPHA", self.alpha_schedule.len() as f64);
        nl.push_array("ALSCHD", self.alpha_schedule.clone());
        nl.push_real("WT", self.weight);
        nl.push_real("LOOP", self.loop_mode);
        nl
    }
}

/// Generates the flight-condition matrix.
///
/// The schedule holds `NALPHA = floor((end - start) / step) + 1` angles.
///
/// # Errors
///
/// Returns [`ToolError::InvalidArguments`] for empty Mach/altitude lists, a
/// non-positive step, an inverted range, more than 20 angles, or more than
/// 400 total analysis points.
pub fn fltcon_matrix(
    machs: &[f64],
    altitudes: &[f64],
    alpha_range: (f64, f64, f64),
    weight: f64,
    loop_mode: f64,
) -> Result<FltconConversion, ToolError> {
    const NAME: &str = "generate_fltcon_matrix";
    if machs.is_empty() {
        return Err(invalid(NAME, "at least one Mach number is required"));
    }
    if altitudes.is_empty() {
        return Err(invalid(NAME, "at least one altitude is required"));
    }
    let (start, end, step) = alpha_range;
    if step <= 0.0 {
        return Err(invalid(NAME, format!("alpha step must be positive, got {step}")));
    }
    if end < start {
        return Err(invalid(
            NAME,
            format!("alpha range is inverted: start {start} > end {end}"),
        ));
    }

    // Tolerant floor so ranges like -2..10 step 2 land exactly on the end.
    let count = (((end - start) / step) + 1e-9).floor() as usize + 1;
    if count > MAX_ALPHA_COUNT {
        return Err(invalid(
            NAME,
            format!("NALPHA {count} exceeds the DATCOM limit of {MAX_ALPHA_COUNT}"),
        ));
    }
    let points = machs.len() * altitudes.len() * count;
    if points > MAX_ANALYSIS_POINTS {
        return Err(invalid(
            NAME,
            format!("{points} analysis points exceed the DATCOM limit of {MAX_ANALYSIS_POINTS}"),
        ));
    }

    let alpha_schedule: Vec<f64> = (0..count).map(|i| start + (i as f64) * step).collect();

    Ok(FltconConversion {
        machs: machs.to_vec(),
        altitudes: altitudes.to_vec(),
        alpha_schedule,
        weight,
        loop_mode,
    })
}

/// Cross-field validation report for an aggregated parameter record.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    /// `"PASS"` or `"FAIL"`.
    pub status: String,
    /// Hard inconsistencies.
    pub errors: Vec<String>,
    /// Out-of-typical-range observations.
    pub warnings: Vec<String>,
    /// Keys that were inspected.
    pub checked_parameters: Vec<String>,
    /// One-line count summary.
    pub summary: String,
}

impl ValidationReport {
    /// Whether the record passed without errors.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.status == "PASS"
    }
}

fn validate_object(prefix: &str, object: &serde_json::Map<String, serde_json::Value>, errors: &mut Vec<String>, warnings: &mut Vec<String>) {
    let get = |key: &str| object.get(key).and_then(serde_json::Value::as_f64);

    if let (Some(root), Some(tip)) = (get("CHRDR"), get("CHRDTP"))
        && tip > root
    {
        errors.push(format!(
            "{prefix}tip chord (CHRDTP={tip}) should not be greater than root chord (CHRDR={root})"
        ));
    }
    if let (Some(sspn), Some(sspne)) = (get("SSPN"), get("SSPNE"))
        && sspne > sspn
    {
        errors.push(format!(
            "{prefix}exposed semi-span (SSPNE={sspne}) should not be greater than theoretical semi-span (SSPN={sspn})"
        ));
    }
    if let Some(sweep) = get("SAVSI")
        && sweep.abs() > 70.0
    {
        warnings.push(format!(
            "{prefix}sweep angle of {sweep} deg is outside the typical range (+/-70 deg)"
        ));
    }
    if let Some(dihedral) = get("DHDADI")
        && dihedral.abs() > 15.0
    {
        warnings.push(format!(
            "{prefix}dihedral angle of {dihedral} deg is outside the typical range (+/-15 deg)"
        ));
    }
    if let (Some(nmach), Some(nalt), Some(nalpha)) = (get("NMACH"), get("NALT"), get("NALPHA")) {
        let points = nmach * nalt * nalpha;
        if points > MAX_ANALYSIS_POINTS as f64 {
            errors.push(format!(
                "{prefix}{points} analysis points exceed the DATCOM limit of {MAX_ANALYSIS_POINTS}"
            ));
        }
    }
    for (key, value) in object {
        if value.is_i64() && !key.starts_with('_') {
            warnings.push(format!(
                "{prefix}parameter {key}={value} should be a real (e.g., {value}.0)"
            ));
        }
    }
}

/// Validates consistency across an aggregated parameter record.
///
/// Accepts either a flat field map or a map of namelist-name → field map.
/// A failed validation is a report, not an error: the formatter still runs
/// and the report is appended to the output.
#[must_use]
pub fn validate_parameters(params: &serde_json::Value) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut checked = Vec::new();

    if let Some(object) = params.as_object() {
        let nested = object.values().any(serde_json::Value::is_object);
        if nested {
            for (name, value) in object {
                checked.push(name.clone());
                if let Some(inner) = value.as_object() {
                    validate_object(&format!("{name}: "), inner, &mut errors, &mut warnings);
                }
            }
        } else {
            checked.extend(object.keys().cloned());
            validate_object("", object, &mut errors, &mut warnings);
        }
    }

    let status = if errors.is_empty() { "PASS" } else { "FAIL" };
    let summary = format!("{} errors, {} warnings.", errors.len(), warnings.len());
    ValidationReport {
        status: status.to_string(),
        errors,
        warnings,
        checked_parameters: checked,
        summary,
    }
}
