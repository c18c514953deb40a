//! Planform geometry math.
//!
//! One set of formulas for every lifting surface; wing, horizontal tail,
//! and vertical tail all go through [`planform`] with no per-surface
//! specialization. Values are kept at full precision; rounding happens
//! only when rendering namelists.

/// Derived planform dimensions for a lifting surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Planform {
    /// Span `b = sqrt(A * S)` (height for a vertical surface).
    pub span: f64,
    /// Root chord `Croot = 2S / (b * (1 + lambda))`.
    pub root_chord: f64,
    /// Tip chord `Ctip = lambda * Croot`.
    pub tip_chord: f64,
    /// Semi-span `SSPN = b / 2`.
    pub semi_span: f64,
    /// Mean aerodynamic chord.
    pub mac: f64,
}

/// Span: `b = sqrt(A * S)`.
#[must_use]
pub fn wingspan(area: f64, aspect_ratio: f64) -> f64 {
    (aspect_ratio * area).sqrt()
}

/// Root chord: `Croot = 2S / (b * (1 + lambda))`.
#[must_use]
pub fn root_chord(area: f64, span: f64, taper: f64) -> f64 {
    (2.0 * area) / (span * (1.0 + taper))
}

/// Tip chord: `Ctip = lambda * Croot`.
#[must_use]
pub fn tip_chord(root: f64, taper: f64) -> f64 {
    taper * root
}

/// Mean aerodynamic chord: `MAC = (2/3) * Croot * (1 + λ + λ²) / (1 + λ)`.
#[must_use]
pub fn mean_aerodynamic_chord(root: f64, taper: f64) -> f64 {
    (2.0 / 3.0) * root * (1.0 + taper + taper * taper) / (1.0 + taper)
}

/// Derives the full planform for a surface from area, aspect ratio, and
/// taper ratio.
#[must_use]
pub fn planform(area: f64, aspect_ratio: f64, taper: f64) -> Planform {
    let span = wingspan(area, aspect_ratio);
    let root = root_chord(area, span, taper);
    Planform {
        span,
        root_chord: root,
        tip_chord: tip_chord(root, taper),
        semi_span: span / 2.0,
        mac: mean_aerodynamic_chord(root, taper),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            (actual - expected).abs() < tolerance,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_reference_wing() {
        // S=100, A=8, lambda=0.5
        let p = planform(100.0, 8.0, 0.5);
        assert_close(p.span, 28.284_271_247_461_9, 1e-9);
        assert_close(p.root_chord, 4.714_045_207_910_3, 1e-9);
        assert_close(p.tip_chord, 2.357_022_603_955_2, 1e-9);
        assert_close(p.semi_span, 14.142_135_623_730_9, 1e-9);
    }

    #[test]
    fn test_f4_wing() {
        // S=530, A=2.8, lambda=0.3
        let p = planform(530.0, 2.8, 0.3);
        assert_close(p.span, 38.5227, 1e-3);
        assert_close(p.root_chord, 21.17, 5e-3);
        assert_close(p.tip_chord, 6.35, 5e-3);
        assert_close(p.semi_span, 19.26, 5e-3);
    }

    #[test]
    fn test_area_round_trip_grid() {
        // CHRDR * (1 + lambda) * SSPN must reconstruct S to 1e-6 relative.
        for &s in &[1.0, 42.5, 100.0, 530.0, 5_000.0] {
            for &a in &[0.5, 2.8, 8.0, 12.0] {
                for &taper in &[0.05, 0.3, 0.5, 1.0] {
                    let p = planform(s, a, taper);
                    let reconstructed = p.root_chord * (1.0 + taper) * p.semi_span;
                    let relative = (reconstructed - s).abs() / s;
                    assert!(
                        relative < 1e-6,
                        "S={s} A={a} λ={taper}: relative error {relative}"
                    );
                    assert_close(p.tip_chord / p.root_chord, taper, 1e-9);
                }
            }
        }
    }

    #[test]
    fn test_mac_untapered_equals_chord() {
        // lambda = 1: rectangular wing, MAC == chord everywhere.
        let p = planform(60.0, 6.0, 1.0);
        assert_close(p.mac, p.root_chord, 1e-12);
        assert_close(p.tip_chord, p.root_chord, 1e-12);
    }
}
