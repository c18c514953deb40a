//! Namelist model and `.dat` rendering.
//!
//! A DATCOM input file is a leading `*` comment block followed by namelist
//! blocks in fixed order: `FLTCON`, `SYNTHS`, `BODY`, `WGPLNF`, `HTPLNF`,
//! `VTPLNF` (absent sections omitted). Each block opens with ` $NAME`
//! (leading space, uppercase) and closes with `$`. Scalars render as
//! `KEY=value`, arrays as `KEY(1)=v1,v2,…`, and every real literal carries
//! a decimal point. Lines end with LF.

use std::fmt::Write;

/// A single namelist field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A scalar real.
    Real(f64),
    /// An array of reals, rendered comma-separated.
    RealArray(Vec<f64>),
}

/// An ordered namelist block.
#[derive(Debug, Clone)]
pub struct Namelist {
    /// Block name without the `$` (e.g., `WGPLNF`).
    pub name: String,
    fields: Vec<(String, Value)>,
    /// Free-standing card printed before the block (airfoil designation).
    pub leading_card: Option<String>,
}

impl Namelist {
    /// Creates an empty namelist block.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fields: Vec::new(),
            leading_card: None,
        }
    }

    /// Appends a scalar real field.
    pub fn push_real(&mut self, key: &str, value: f64) {
        self.fields.push((key.to_string(), Value::Real(value)));
    }

    /// Appends a real array field.
    pub fn push_array(&mut self, key: &str, values: Vec<f64>) {
        self.fields.push((key.to_string(), Value::RealArray(values)));
    }

    /// The ordered fields of this block.
    #[must_use]
    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    /// Renders this block into `out`.
    fn render(&self, out: &mut String) {
        if let Some(ref card) = self.leading_card {
            let _ = writeln!(out, "{card}");
        }
        let _ = write!(out, " ${}", self.name);
        let last = self.fields.len().saturating_sub(1);
        for (i, (key, value)) in self.fields.iter().enumerate() {
            let rendered = match value {
                Value::Real(v) => format!("{key}={}", fmt_real(*v)),
                Value::RealArray(vs) => {
                    let joined: Vec<String> = vs.iter().map(|v| fmt_real(*v)).collect();
                    format!("{key}(1)={}", joined.join(","))
                }
            };
            if i == 0 {
                let _ = write!(out, " {rendered}");
            } else {
                let _ = write!(out, "\n  {rendered}");
            }
            if i == last {
                let _ = write!(out, "$");
            } else {
                let _ = write!(out, ",");
            }
        }
        if self.fields.is_empty() {
            let _ = write!(out, "$");
        }
        let _ = writeln!(out);
    }
}

/// Formats a FORTRAN-style real literal: always carries a decimal point,
/// rounded to four decimals with trailing zeros trimmed.
#[must_use]
pub fn fmt_real(v: f64) -> String {
    let rounded = (v * 10_000.0).round() / 10_000.0;
    let mut s = format!("{rounded}");
    if s.contains('e') || s.contains('E') {
        s = format!("{rounded:.4}");
    }
    if !s.contains('.') {
        s.push_str(".0");
    }
    s
}

/// A full `.dat` file under assembly.
#[derive(Debug, Clone, Default)]
pub struct DatFile {
    header: Vec<String>,
    blocks: Vec<Namelist>,
}

/// Fixed block rendering order.
const BLOCK_ORDER: &[&str] = &["FLTCON", "SYNTHS", "BODY", "WGPLNF", "HTPLNF", "VTPLNF"];

impl DatFile {
    /// Creates an empty file.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a `*` comment line to the leading header block.
    ///
    /// Embedded newlines are flattened so the header stays a comment.
    pub fn push_header(&mut self, line: &str) {
        let flat = line.replace(['\n', '\r'], " ");
        self.header.push(format!("* {}", flat.trim()));
    }

    /// Adds a namelist block. Blocks render in the documented fixed order
    /// regardless of insertion order.
    pub fn push_block(&mut self, block: Namelist) {
        self.blocks.push(block);
    }

    /// Whether any namelist blocks have been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Renders the complete file with LF line endings.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.header {
            let _ = writeln!(out, "{line}");
        }
        for name in BLOCK_ORDER {
            for block in self.blocks.iter().filter(|b| b.name == *name) {
                block.render(&mut out);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fmt_real_always_has_decimal_point() {
        assert_eq!(fmt_real(1.0), "1.0");
        assert_eq!(fmt_real(0.0), "0.0");
        assert_eq!(fmt_real(-3.0), "-3.0");
        assert_eq!(fmt_real(21.1692), "21.1692");
        assert_eq!(fmt_real(0.3), "0.3");
        assert!(fmt_real(40_000.0).contains('.'));
    }

    #[test]
    fn test_fmt_real_rounds_to_four_decimals() {
        assert_eq!(fmt_real(21.169_230_769), "21.1692");
        assert_eq!(fmt_real(0.300_000_000_000_04), "0.3");
    }

    #[test]
    fn test_block_delimiters() {
        let mut nl = Namelist::new("WGPLNF");
        nl.push_real("CHRDR", 21.1692);
        nl.push_real("CHRDTP", 6.3508);
        let mut out = String::new();
        nl.render(&mut out);
        assert!(out.starts_with(" $WGPLNF "));
        assert!(out.trim_end().ends_with('$'));
        assert!(out.contains("CHRDR=21.1692,"));
        assert!(out.contains("CHRDTP=6.3508$"));
    }

    #[test]
    fn test_array_rendering() {
        let mut nl = Namelist::new("FLTCON");
        nl.push_array("MACH", vec![0.6, 0.8, 0.95]);
        let mut out = String::new();
        nl.render(&mut out);
        assert!(out.contains("MACH(1)=0.6,0.8,0.95$"));
    }

    #[test]
    fn test_block_order_is_fixed() {
        let mut dat = DatFile::new();
        dat.push_block(Namelist::new("WGPLNF"));
        dat.push_block(Namelist::new("FLTCON"));
        dat.push_block(Namelist::new("SYNTHS"));
        let text = dat.render();
        let fltcon = text.find("$FLTCON").unwrap_or(usize::MAX);
        let synths = text.find("$SYNTHS").unwrap_or(usize::MAX);
        let wgplnf = text.find("$WGPLNF").unwrap_or(usize::MAX);
        assert!(fltcon < synths, "FLTCON must precede SYNTHS");
        assert!(synths < wgplnf, "SYNTHS must precede WGPLNF");
    }

    #[test]
    fn test_header_lines_are_comments() {
        let mut dat = DatFile::new();
        dat.push_header("CUSTOM AIRCRAFT");
        dat.push_header("multi\nline source");
        let text = dat.render();
        for line in text.lines() {
            assert!(line.starts_with("* "), "header line not a comment: {line}");
        }
        assert!(text.contains("multi line source"));
    }

    #[test]
    fn test_every_real_has_decimal_point() {
        let mut nl = Namelist::new("FLTCON");
        nl.push_real("NMACH", 1.0);
        nl.push_array("ALT", vec![10_000.0, 20_000.0]);
        nl.push_real("WT", 40_000.0);
        let mut out = String::new();
        nl.render(&mut out);
        for token in out
            .split(['=', ',', '\n', '$'])
            .filter(|t| !t.trim().is_empty())
            .filter(|t| t.trim().chars().next().is_some_and(|c| c.is_ascii_digit() || c == '-'))
        {
            assert!(token.contains('.'), "real literal missing decimal point: {token}");
        }
    }

    #[test]
    fn test_leading_card_precedes_block() {
        let mut nl = Namelist::new("WGPLNF");
        nl.leading_card = Some("NACA-W-4-2412".to_string());
        nl.push_real("TYPE", 1.0);
        let mut out = String::new();
        nl.render(&mut out);
        assert!(out.starts_with("NACA-W-4-2412\n $WGPLNF"));
    }
}
