//! Fixed-sequence DATCOM input-file generator.
//!
//! No branching, no model-driven tool selection: extract → gate → wing →
//! flight matrix → synthesis → body → tails → validate → format, in that
//! order every time. The gate ends the run early with a clarification
//! naming the missing fields; any later failure yields the partial file
//! plus an explicit error block. The run itself never crashes.

use std::fmt::Write;
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::datcom::convert::{self, SurfaceConversion, SynthsConversion};
use crate::datcom::namelist::DatFile;
use crate::datcom::params::{DatcomParams, parse_extraction};
use crate::error::{ChatError, ToolError};
use crate::llm::message::{ChatMessage, ChatRequest};
use crate::llm::provider::ChatProvider;
use crate::workflow::prompt::EXTRACTION_SYSTEM_PROMPT;
use crate::workflow::state::WorkflowState;

/// Inferred horizontal tail: area fraction of the wing, aspect ratio,
/// taper ratio.
const HTAIL_DEFAULTS: (f64, f64, f64) = (0.20, 4.0, 0.5);
/// Inferred vertical tail: area fraction of the wing, aspect ratio, taper
/// ratio.
const VTAIL_DEFAULTS: (f64, f64, f64) = (0.15, 1.5, 0.6);
/// Margin applied when estimating fuselage length from the furthest
/// explicit station.
const STATION_LENGTH_MARGIN: f64 = 1.15;

/// The fixed-sequence DATCOM generator.
pub struct DatcomPipeline {
    chat: Arc<dyn ChatProvider>,
    model: String,
}

impl DatcomPipeline {
    /// Creates the pipeline over the shared chat provider.
    #[must_use]
    pub fn new(chat: Arc<dyn ChatProvider>, config: &EngineConfig) -> Self {
        Self {
            chat,
            model: config.chat_model.clone(),
        }
    }

    /// Extracts parameters from the question, retrying the parse once.
    async fn extract(&self, question: &str) -> Result<DatcomParams, ChatError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(EXTRACTION_SYSTEM_PROMPT),
                ChatMessage::user(question),
            ],
            temperature: Some(0.0),
            json_mode: true,
            tools: Vec::new(),
        };

        let mut last_err = None;
        for attempt in 0..2 {
            let response = self.chat.complete(&request).await?;
            // No tool schemas are offered here; a tool-request reply
            // yields empty text and fails the parse like any other
            // malformed extraction.
            match parse_extraction(response.text().unwrap_or_default()) {
                Ok(params) => return Ok(params),
                Err(e) => {
                    warn!(attempt, error = %e, "extraction parse failed");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or(ChatError::ResponseParse {
            message: "extraction produced no parseable reply".to_string(),
        }))
    }

    /// Runs the full sequence, always leaving a non-empty `generation`.
    pub async fn run(&self, state: &mut WorkflowState) {
        state.seed_user_turn();

        // Stage 1: extract.
        let params = match self.extract(&state.question).await {
            Ok(params) => params,
            Err(e) => {
                warn!(error = %e, "parameter extraction failed");
                state.generation = "無法從您的問題中解析出 DATCOM 參數。請以明確的數值重新描述，\
                                    例如：機翼 S=530, A=2.8, λ=0.3, 後掠角=45, Mach=0.8, 高度=10000。"
                    .to_string();
                let closing = ChatMessage::assistant(state.generation.clone());
                state.push_message(closing);
                return;
            }
        };
        debug!(?params, "extracted parameters");

        // Stage 2: gate.
        let missing = params.missing_required();
        if !missing.is_empty() {
            let mut message =
                String::from("無法生成 DATCOM 輸入檔，缺少以下必要參數：\n");
            for field in &missing {
                let _ = writeln!(message, "- {field}");
            }
            message.push_str("請在問題中補齊上述數值後重新提交。");
            state.generation = message;
            let closing = ChatMessage::assistant(state.generation.clone());
            state.push_message(closing);
            return;
        }

        // Stages 3-7: conversions.
        let mut dat = DatFile::new();
        let mut notes: Vec<String> = Vec::new();
        let built = Self::build(&params, &mut dat, &mut notes);

        dat.push_header("CUSTOM AIRCRAFT DATCOM INPUT");
        dat.push_header(&format!("SOURCE: {}", state.question));
        for note in &notes {
            dat.push_header(&format!("NOTE: {note}"));
        }

        state.generation = match built {
            Ok(aggregate) => {
                // Stage 8: validate. A failed validation is reported, not
                // fatal.
                let report = convert::validate_parameters(&aggregate);
                // Stage 9: format.
                let mut output = dat.render();
                if !report.passed() || !report.warnings.is_empty() {
                    output.push_str("\n--- 參數驗證報告 ---\n");
                    let _ = writeln!(output, "狀態: {}", report.status);
                    for error in &report.errors {
                        let _ = writeln!(output, "錯誤: {error}");
                    }
                    for warning in &report.warnings {
                        let _ = writeln!(output, "警告: {warning}");
                    }
                }
                output
            }
            Err(e) => {
                warn!(error = %e, "conversion stage failed after the gate");
                let partial = dat.render();
                format!("{partial}* ERROR: {e}\n* 以上為錯誤發生前已完成的部分輸入檔。\n")
            }
        };
        let closing = ChatMessage::assistant(state.generation.clone());
        state.push_message(closing);
    }

    /// Stages 3-7: runs the conversions in order, pushing completed blocks
    /// into `dat` so a later failure still leaves the partial file.
    fn build(
        params: &DatcomParams,
        dat: &mut DatFile,
        notes: &mut Vec<String>,
    ) -> Result<serde_json::Value, ToolError> {
        // Stage 3: wing conversion. The gate guarantees the inputs.
        let wing = convert::convert_wing(
            params.wing_s.unwrap_or_default(),
            params.wing_a.unwrap_or_default(),
            params.wing_taper.unwrap_or_default(),
            params.wing_sweep.unwrap_or_default(),
            params.wing_airfoil.as_deref(),
            params.wing_dihedral.unwrap_or(0.0),
            params.wing_twist.unwrap_or(0.0),
            0.0,
        )?;
        dat.push_block(wing.to_namelist());

        // Stage 4: flight matrix.
        let (alpha_range, alpha_defaulted) = params.alpha_range();
        if alpha_defaulted {
            notes.push("攻角範圍未指定，使用預設 -2 至 10 度（間隔 2 度）".to_string());
        }
        let machs = params.mach_numbers.clone().unwrap_or_default();
        let altitudes = params.altitudes.clone().unwrap_or_default();
        let fltcon = convert::fltcon_matrix(
            &machs,
            &altitudes,
            alpha_range,
            params.weight.unwrap_or(0.0),
            2.0,
        )?;
        dat.push_block(fltcon.to_namelist());

        // Stage 5: synthesis positions.
        let synths = Self::synthesis(params, &wing, notes)?;
        dat.push_block(synths.to_namelist());

        // Stage 6: body geometry, when body data is present.
        let body = if params.has_body() {
            let body = convert::body_geometry(
                params.body_length.unwrap_or_default(),
                params.body_max_diameter.unwrap_or_default(),
                None,
                None,
                None,
            )?;
            dat.push_block(body.to_namelist());
            Some(body)
        } else {
            None
        };

        // Stage 7: tail conversions, inferring missing surfaces from the
        // wing.
        let htail = Self::tail(params, &wing, false, notes)?;
        dat.push_block(htail.to_namelist());
        let vtail = Self::tail(params, &wing, true, notes)?;
        dat.push_block(vtail.to_namelist());

        // Aggregate record for validation.
        let mut aggregate = json!({
            "FLTCON": {
                "NMACH": fltcon.machs.len() as f64,
                "NALT": fltcon.altitudes.len() as f64,
                "NALPHA": fltcon.alpha_schedule.len() as f64,
                "WT": fltcon.weight,
            },
            "SYNTHS": serde_json::to_value(&synths).unwrap_or_default(),
            "WGPLNF": wing.to_json(),
            "HTPLNF": htail.to_json(),
            "VTPLNF": vtail.to_json(),
        });
        if let (Some(body), Some(object)) = (body, aggregate.as_object_mut()) {
            object.insert(
                "BODY".to_string(),
                serde_json::to_value(&body).unwrap_or_default(),
            );
        }
        Ok(aggregate)
    }

    /// Resolves synthesis positions from explicit stations or documented
    /// defaults.
    fn synthesis(
        params: &DatcomParams,
        wing: &SurfaceConversion,
        notes: &mut Vec<String>,
    ) -> Result<SynthsConversion, ToolError> {
        let explicit =
            params.xcg.is_some() && params.xw.is_some() && params.xh.is_some();

        if explicit {
            let xcg = params.xcg.unwrap_or_default();
            let xw = params.xw.unwrap_or_default();
            let xh = params.xh.unwrap_or_default();
            // Without a stated length, estimate it from the furthest
            // station with margin.
            let length = params.body_length.unwrap_or_else(|| {
                let furthest = xcg.max(xw).max(xh).max(params.xv.unwrap_or(0.0));
                notes.push("機身長度未指定，以最遠站位乘以 1.15 估算".to_string());
                furthest * STATION_LENGTH_MARGIN
            });
            let vtail_pct = params.xv.map_or(0.65, |xv| xv / length);
            convert::synthesis_positions(
                length,
                xw / length,
                xh / length,
                vtail_pct,
                xcg / length,
                0.0,
                0.0,
                0.0,
            )
        } else {
            // Documented defaults: wing 40%, htail 90%, vtail 65%, cg 35%.
            let length = params.body_length.unwrap_or_else(|| {
                notes.push(
                    "機身長度與站位均未指定，以翼展作為參考長度計算各組件位置".to_string(),
                );
                wing.planform.span
            });
            notes.push(
                "組件站位未完整指定，使用預設比例（機翼 40%、水平尾翼 90%、垂直尾翼 65%、重心 35%）"
                    .to_string(),
            );
            convert::synthesis_positions(length, 0.40, 0.90, 0.65, 0.35, 0.0, 0.0, 0.0)
        }
    }

    /// Resolves one tail surface, inferring from the wing when absent.
    fn tail(
        params: &DatcomParams,
        wing: &SurfaceConversion,
        is_vertical: bool,
        notes: &mut Vec<String>,
    ) -> Result<SurfaceConversion, ToolError> {
        let (explicit, defaults, label) = if is_vertical {
            (
                (params.vtail_s, params.vtail_a, params.vtail_taper, params.vtail_sweep),
                VTAIL_DEFAULTS,
                "垂直尾翼",
            )
        } else {
            (
                (params.htail_s, params.htail_a, params.htail_taper, params.htail_sweep),
                HTAIL_DEFAULTS,
                "水平尾翼",
            )
        };

        if let (Some(area), Some(aspect), Some(taper)) = (explicit.0, explicit.1, explicit.2) {
            let sweep = explicit.3.unwrap_or(wing.sweep);
            return convert::convert_tail(area, aspect, taper, sweep, None, is_vertical);
        }

        let (area_fraction, aspect, taper) = defaults;
        let area = wing.area * area_fraction;
        notes.push(format!(
            "{label}未指定，依機翼面積推算（S={:.2}，A={aspect}，λ={taper}，後掠角取機翼值）",
            area
        ));
        convert::convert_tail(area, aspect, taper, wing.sweep, None, is_vertical)
    }
}
