//! Tool executor: dispatches tool calls to handlers.
//!
//! Maps tool names to direct Rust function calls against the conversion
//! layer, the calculator, and the retrieval backends. Each call runs under
//! a per-tool wall-clock budget; failures become error observations, never
//! panics, so the reasoning loop can correct and retry.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::EngineConfig;
use crate::datcom::convert;
use crate::error::ToolError;
use crate::llm::ChatProvider;
use crate::llm::embedding::Embedder;
use crate::store::{RetrievedDoc, VectorSearch};
use crate::tools::{ToolCall, ToolResult, calculator};

/// Maximum raw byte length of tool argument JSON from the LLM.
const MAX_TOOL_ARGS_LEN: usize = 100_000;

/// A successful tool observation plus any retrieved documents.
pub(crate) struct Observation {
    pub content: String,
    pub docs: Vec<RetrievedDoc>,
}

impl From<String> for Observation {
    fn from(content: String) -> Self {
        Self {
            content,
            docs: Vec::new(),
        }
    }
}

/// Executes tool calls by dispatching to handlers.
///
/// Holds shared handles to the chat provider (for the routing tool), the
/// embedder, and the vector store. All handles are initialized once at
/// startup and shared read-only across in-flight queries.
pub struct ToolExecutor {
    pub(crate) chat: Arc<dyn ChatProvider>,
    pub(crate) embedder: Arc<dyn Embedder>,
    pub(crate) store: Arc<dyn VectorSearch>,
    pub(crate) config: EngineConfig,
}

impl ToolExecutor {
    /// Creates a new executor over the shared backends.
    #[must_use]
    pub fn new(
        chat: Arc<dyn ChatProvider>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorSearch>,
        config: EngineConfig,
    ) -> Self {
        Self {
            chat,
            embedder,
            store,
            config,
        }
    }

    /// Wall-clock budget for a tool.
    fn timeout_for(&self, name: &str) -> Duration {
        match name {
            // Chat-backed routing shares the remote-call budget.
            "design_area_router" => self.config.remote_timeout,
            "retrieve_datcom_archive" | "metadata_search" | "article_lookup" => {
                self.config.retrieval_timeout
            }
            // The calculator and the pure conversions are in-memory.
            _ => self.config.calculator_timeout,
        }
    }

    /// Dispatches a tool call and converts the outcome into a
    /// [`ToolResult`] observation.
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        if call.arguments.len() > MAX_TOOL_ARGS_LEN {
            return ToolResult {
                tool_call_id: call.id.clone(),
                name: call.name.clone(),
                content: format!(
                    "tool arguments too large ({} bytes, max {MAX_TOOL_ARGS_LEN})",
                    call.arguments.len()
                ),
                is_error: true,
                docs: Vec::new(),
            };
        }

        let budget = self.timeout_for(&call.name);
        let outcome = match tokio::time::timeout(budget, self.dispatch(call)).await {
            Ok(result) => result,
            Err(_) => Err(ToolError::Timeout {
                name: call.name.clone(),
                seconds: budget.as_secs(),
            }),
        };

        match outcome {
            Ok(observation) => {
                debug!(tool = call.name, call_id = call.id, "tool execution complete");
                ToolResult {
                    tool_call_id: call.id.clone(),
                    name: call.name.clone(),
                    content: observation.content,
                    is_error: false,
                    docs: observation.docs,
                }
            }
            Err(e) => {
                debug!(tool = call.name, call_id = call.id, error = %e, "tool execution failed");
                ToolResult {
                    tool_call_id: call.id.clone(),
                    name: call.name.clone(),
                    content: e.to_string(),
                    is_error: true,
                    docs: Vec::new(),
                }
            }
        }
    }

    async fn dispatch(&self, call: &ToolCall) -> Result<Observation, ToolError> {
        match call.name.as_str() {
            "design_area_router" => self.tool_design_area_router(&call.arguments).await,
            "retrieve_datcom_archive" => self.tool_retrieve_archive(&call.arguments).await,
            "metadata_search" => self.tool_metadata_search(&call.arguments).await,
            "article_lookup" => self.tool_article_lookup(&call.arguments).await,
            "python_calculator" => self.tool_python_calculator(&call.arguments),
            "convert_wing_to_datcom" => self.tool_convert_wing(&call.arguments),
            "convert_tail_to_datcom" => self.tool_convert_tail(&call.arguments),
            "calculate_synthesis_positions" => self.tool_synthesis_positions(&call.arguments),
            "define_body_geometry" => self.tool_body_geometry(&call.arguments),
            "generate_fltcon_matrix" => self.tool_fltcon_matrix(&call.arguments),
            "validate_datcom_parameters" => self.tool_validate_parameters(&call.arguments),
            other => Err(ToolError::Unknown {
                name: other.to_string(),
            }),
        }
    }

    /// Deserializes tool arguments, treating empty input as `{}`.
    pub(crate) fn parse_args<T: DeserializeOwned>(name: &str, args: &str) -> Result<T, ToolError> {
        let args = if args.trim().is_empty() { "{}" } else { args };
        serde_json::from_str(args).map_err(|e| ToolError::InvalidArguments {
            name: name.to_string(),
            message: e.to_string(),
        })
    }

    fn to_pretty_json<T: serde::Serialize>(name: &str, value: &T) -> Result<String, ToolError> {
        serde_json::to_string_pretty(value).map_err(|e| ToolError::Execution {
            name: name.to_string(),
            message: format!("serialization error: {e}"),
        })
    }

    // -----------------------------------------------------------------------
    // In-memory tool implementations
    // -----------------------------------------------------------------------

    /// Evaluates an arithmetic expression with the closed evaluator.
    fn tool_python_calculator(&self, args: &str) -> Result<Observation, ToolError> {
        #[derive(Deserialize)]
        struct Args {
            expression: String,
        }
        let args: Args = Self::parse_args("python_calculator", args)?;
        let value = calculator::evaluate(&args.expression)?;
        Ok(Observation::from(format!("計算結果: {value}")))
    }

    /// Converts wing geometry to `$WGPLNF` fields.
    fn tool_convert_wing(&self, args: &str) -> Result<Observation, ToolError> {
        #[derive(Deserialize)]
        struct Args {
            #[serde(rename = "S")]
            s: f64,
            #[serde(rename = "A")]
            a: f64,
            lambda: f64,
            sweep_angle: f64,
            airfoil: Option<String>,
            #[serde(default)]
            dihedral: f64,
            #[serde(default)]
            twist: f64,
            #[serde(default)]
            sweep_location: f64,
        }
        let args: Args = Self::parse_args("convert_wing_to_datcom", args)?;
        let wing = convert::convert_wing(
            args.s,
            args.a,
            args.lambda,
            args.sweep_angle,
            args.airfoil.as_deref(),
            args.dihedral,
            args.twist,
            args.sweep_location,
        )?;
        let json = wing.to_json();
        Ok(Observation::from(Self::to_pretty_json(
            "convert_wing_to_datcom",
            &json,
        )?))
    }

    /// Converts tail geometry to `$HTPLNF`/`$VTPLNF` fields.
    fn tool_convert_tail(&self, args: &str) -> Result<Observation, ToolError> {
        #[derive(Deserialize)]
        struct Args {
            component: String,
            #[serde(rename = "S")]
            s: f64,
            #[serde(rename = "A")]
            a: f64,
            lambda: f64,
            sweep_angle: f64,
            airfoil: Option<String>,
            is_vertical: bool,
        }
        let args: Args = Self::parse_args("convert_tail_to_datcom", args)?;
        let tail = convert::convert_tail(
            args.s,
            args.a,
            args.lambda,
            args.sweep_angle,
            args.airfoil.as_deref(),
            args.is_vertical,
        )?;
        let mut json = tail.to_json();
        if let Some(object) = json.as_object_mut() {
            object.insert("component".to_string(), args.component.into());
            object.insert("namelist".to_string(), tail.namelist.into());
        }
        Ok(Observation::from(Self::to_pretty_json(
            "convert_tail_to_datcom",
            &json,
        )?))
    }

    /// Computes `$SYNTHS` component stations.
    fn tool_synthesis_positions(&self, args: &str) -> Result<Observation, ToolError> {
        #[derive(Deserialize)]
        struct Args {
            fuselage_length: f64,
            wing_position_percent: Option<f64>,
            htail_position_percent: Option<f64>,
            vtail_position_percent: Option<f64>,
            cg_position_percent: Option<f64>,
            #[serde(default)]
            wing_z: f64,
            #[serde(default)]
            htail_z: f64,
            #[serde(default)]
            vtail_z: f64,
        }
        let args: Args = Self::parse_args("calculate_synthesis_positions", args)?;
        let synths = convert::synthesis_positions(
            args.fuselage_length,
            args.wing_position_percent.unwrap_or(0.40),
            args.htail_position_percent.unwrap_or(0.90),
            args.vtail_position_percent.unwrap_or(0.65),
            args.cg_position_percent.unwrap_or(0.35),
            args.wing_z,
            args.htail_z,
            args.vtail_z,
        )?;
        Ok(Observation::from(Self::to_pretty_json(
            "calculate_synthesis_positions",
            &synths,
        )?))
    }

    /// Generates `$BODY` stations.
    fn tool_body_geometry(&self, args: &str) -> Result<Observation, ToolError> {
        #[derive(Deserialize)]
        struct Args {
            fuselage_length: f64,
            max_diameter: f64,
            nose_length: Option<f64>,
            tail_length: Option<f64>,
            n_stations: Option<usize>,
        }
        let args: Args = Self::parse_args("define_body_geometry", args)?;
        let body = convert::body_geometry(
            args.fuselage_length,
            args.max_diameter,
            args.nose_length,
            args.tail_length,
            args.n_stations,
        )?;
        Ok(Observation::from(Self::to_pretty_json(
            "define_body_geometry",
            &body,
        )?))
    }

    /// Generates the `$FLTCON` matrix.
    fn tool_fltcon_matrix(&self, args: &str) -> Result<Observation, ToolError> {
        #[derive(Deserialize)]
        struct Args {
            mach_numbers: Vec<f64>,
            altitudes: Vec<f64>,
            alpha_range: Vec<f64>,
            weight: f64,
            loop_mode: Option<f64>,
        }
        let args: Args = Self::parse_args("generate_fltcon_matrix", args)?;
        let &[start, end, step] = args.alpha_range.as_slice() else {
            return Err(ToolError::InvalidArguments {
                name: "generate_fltcon_matrix".to_string(),
                message: format!(
                    "alpha_range must contain exactly 3 values [start, end, step], got {}",
                    args.alpha_range.len()
                ),
            });
        };
        let fltcon = convert::fltcon_matrix(
            &args.mach_numbers,
            &args.altitudes,
            (start, end, step),
            args.weight,
            args.loop_mode.unwrap_or(2.0),
        )?;

        let mut json = serde_json::to_value(&fltcon).map_err(|e| ToolError::Execution {
            name: "generate_fltcon_matrix".to_string(),
            message: format!("serialization error: {e}"),
        })?;
        if let Some(object) = json.as_object_mut() {
            object.insert("NMACH".to_string(), (fltcon.machs.len() as f64).into());
            object.insert("NALT".to_string(), (fltcon.altitudes.len() as f64).into());
            object.insert(
                "NALPHA".to_string(),
                (fltcon.alpha_schedule.len() as f64).into(),
            );
            object.insert(
                "analysis_points".to_string(),
                (fltcon.analysis_points() as u64).into(),
            );
        }
        Ok(Observation::from(Self::to_pretty_json(
            "generate_fltcon_matrix",
            &json,
        )?))
    }

    /// Runs the cross-field validation report.
    fn tool_validate_parameters(&self, args: &str) -> Result<Observation, ToolError> {
        #[derive(Deserialize)]
        struct Args {
            params: serde_json::Value,
        }
        let args: Args = Self::parse_args("validate_datcom_parameters", args)?;
        let report = convert::validate_parameters(&args.params);
        Ok(Observation::from(Self::to_pretty_json(
            "validate_datcom_parameters",
            &report,
        )?))
    }
}

impl std::fmt::Debug for ToolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolExecutor")
            .field("chat", &self.chat.name())
            .finish()
    }
}
