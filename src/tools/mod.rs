//! Typed tool registry shared by the DATCOM pipeline and the reasoning
//! agent.
//!
//! The registry is populated once at startup from fixed factories, checked
//! for name uniqueness, and read-only afterwards. Tool handlers live in the
//! executor; the definitions here (name, description, JSON Schema) are what
//! the chat model sees.

pub mod calculator;
pub mod executor;
mod retrieval;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ToolError;
use crate::store::RetrievedDoc;

pub use executor::ToolExecutor;

/// A tool definition that can be sent to an LLM for function-calling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name (must match the executor's dispatch table).
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// JSON Schema object describing the tool's parameters.
    pub parameters: serde_json::Value,
}

/// A tool call requested by the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this call (assigned by the provider).
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// JSON-encoded arguments for the tool.
    pub arguments: String,
}

/// The result of executing a tool call.
#[derive(Debug, Clone)]
pub struct ToolResult {
    /// ID of the tool call this result corresponds to.
    pub tool_call_id: String,
    /// Name of the tool that produced this result.
    pub name: String,
    /// Observation content (formatted text or JSON on success, error
    /// message on failure).
    pub content: String,
    /// Whether this result represents an error.
    pub is_error: bool,
    /// Documents surfaced by retrieval tools, for state observability.
    pub docs: Vec<RetrievedDoc>,
}

/// The names of tools that read from the vector store.
pub const RETRIEVAL_TOOLS: [&str; 4] = [
    "design_area_router",
    "retrieve_datcom_archive",
    "metadata_search",
    "article_lookup",
];

/// Whether a tool name belongs to the retrieval set.
#[must_use]
pub fn is_retrieval_tool(name: &str) -> bool {
    RETRIEVAL_TOOLS.contains(&name)
}

/// The process-wide tool registry.
///
/// Built once at startup; read-only afterwards. Exactly these eleven tools
/// are exposed to the model.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    definitions: Vec<ToolDefinition>,
}

impl ToolRegistry {
    /// Builds the registry from the fixed tool factories.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::DuplicateName`] if two factories collide on a
    /// name.
    pub fn build() -> Result<Self, ToolError> {
        let definitions = vec![
            def_design_area_router(),
            def_retrieve_datcom_archive(),
            def_metadata_search(),
            def_article_lookup(),
            def_python_calculator(),
            def_convert_wing(),
            def_convert_tail(),
            def_synthesis_positions(),
            def_body_geometry(),
            def_fltcon_matrix(),
            def_validate_parameters(),
        ];

        let mut seen = std::collections::HashSet::new();
        for def in &definitions {
            if !seen.insert(def.name.clone()) {
                return Err(ToolError::DuplicateName {
                    name: def.name.clone(),
                });
            }
        }

        Ok(Self { definitions })
    }

    /// The tool definitions, in registration order.
    #[must_use]
    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    /// Whether the registry contains a tool with this name.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.definitions.iter().any(|d| d.name == name)
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tool schema definitions
// ---------------------------------------------------------------------------

fn def_design_area_router() -> ToolDefinition {
    ToolDefinition {
        name: "design_area_router".to_string(),
        description: "Select the most relevant design-area collection for an engineering \
                      query. Use this FIRST when no collection has been chosen yet; the \
                      result is the collection name to pass to retrieval tools."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The engineer's original query."
                }
            },
            "required": ["query"],
            "additionalProperties": false
        }),
    }
}

fn def_retrieve_datcom_archive() -> ToolDefinition {
    ToolDefinition {
        name: "retrieve_datcom_archive".to_string(),
        description: "Semantic search over the design archive: historical design documents, \
                      wind tunnel data, performance reports, and DATCOM references. Returns \
                      formatted citations and snippets."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Technical search terms: aircraft models, component names, namelist keywords."
                },
                "collection": {
                    "type": "string",
                    "description": "Design-area collection to search. Determine it with design_area_router first if unset."
                },
                "k": {
                    "type": "integer",
                    "description": "Number of documents to retrieve. Defaults to the configured top-k."
                }
            },
            "required": ["query"],
            "additionalProperties": false
        }),
    }
}

fn def_metadata_search() -> ToolDefinition {
    ToolDefinition {
        name: "metadata_search".to_string(),
        description: "Structured retrieval by exact metadata equality (no vector search). \
                      Ideal for structural references such as a section name, page number, \
                      or source file."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "collection": {
                    "type": "string",
                    "description": "Collection to search in."
                },
                "field": {
                    "type": "string",
                    "description": "Metadata field to match (e.g., 'section', 'page', 'file_name')."
                },
                "value": {
                    "type": "string",
                    "description": "Exact value the field must equal."
                }
            },
            "required": ["collection", "field", "value"],
            "additionalProperties": false
        }),
    }
}

fn def_article_lookup() -> ToolDefinition {
    ToolDefinition {
        name: "article_lookup".to_string(),
        description: "Direct lookup of a document article by its number (e.g., '第24條', \
                      'article 24'). Exact metadata matching; more reliable than vector \
                      search for numbered references."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "reference": {
                    "type": "string",
                    "description": "Text containing the article reference."
                },
                "collection": {
                    "type": "string",
                    "description": "Collection to search in. Defaults to the first available collection."
                }
            },
            "required": ["reference"],
            "additionalProperties": false
        }),
    }
}

fn def_python_calculator() -> ToolDefinition {
    ToolDefinition {
        name: "python_calculator".to_string(),
        description: "Evaluate an arithmetic expression: basic operations, powers, sqrt, \
                      trigonometry, logarithms, and the constants pi and e. Use for any \
                      numeric derivation (wingspan, chord, unit conversion). Example: \
                      'sqrt(530 * 2.8)'."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "expression": {
                    "type": "string",
                    "maxLength": 500,
                    "description": "Mathematical expression to evaluate."
                }
            },
            "required": ["expression"],
            "additionalProperties": false
        }),
    }
}

fn def_convert_wing() -> ToolDefinition {
    ToolDefinition {
        name: "convert_wing_to_datcom".to_string(),
        description: "Convert standard wing parameters (area, aspect ratio, taper ratio, \
                      sweep) to the DATCOM $WGPLNF namelist fields."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "S": { "type": "number", "description": "Wing reference area (ft^2)." },
                "A": { "type": "number", "description": "Aspect ratio." },
                "lambda": { "type": "number", "description": "Taper ratio (0.0 to 1.0)." },
                "sweep_angle": { "type": "number", "description": "Sweep angle (degrees)." },
                "airfoil": { "type": "string", "description": "NACA airfoil designation. Defaults to '2412'." },
                "dihedral": { "type": "number", "description": "Dihedral angle (degrees). Defaults to 0." },
                "twist": { "type": "number", "description": "Twist angle (degrees, negative for washout). Defaults to 0." },
                "sweep_location": { "type": "number", "description": "Chordwise sweep measurement station (fraction of chord). Defaults to 0." }
            },
            "required": ["S", "A", "lambda", "sweep_angle"],
            "additionalProperties": false
        }),
    }
}

fn def_convert_tail() -> ToolDefinition {
    ToolDefinition {
        name: "convert_tail_to_datcom".to_string(),
        description: "Convert tail surface parameters to the DATCOM $HTPLNF or $VTPLNF \
                      namelist fields."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "component": { "type": "string", "description": "'horizontal_tail' or 'vertical_tail'." },
                "S": { "type": "number", "description": "Tail surface area (ft^2)." },
                "A": { "type": "number", "description": "Aspect ratio." },
                "lambda": { "type": "number", "description": "Taper ratio (0.0 to 1.0)." },
                "sweep_angle": { "type": "number", "description": "Sweep angle (degrees)." },
                "airfoil": { "type": "string", "description": "NACA airfoil designation. Defaults to '0012'." },
                "is_vertical": { "type": "boolean", "description": "True for a vertical tail." }
            },
            "required": ["component", "S", "A", "lambda", "sweep_angle", "is_vertical"],
            "additionalProperties": false
        }),
    }
}

fn def_synthesis_positions() -> ToolDefinition {
    ToolDefinition {
        name: "calculate_synthesis_positions".to_string(),
        description: "Compute component X,Z stations for the DATCOM $SYNTHS namelist from \
                      the fuselage length and positional fractions."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "fuselage_length": { "type": "number", "description": "Total fuselage length (ft)." },
                "wing_position_percent": { "type": "number", "description": "Wing apex station as a fraction of length. Defaults to 0.40." },
                "htail_position_percent": { "type": "number", "description": "Horizontal tail station fraction. Defaults to 0.90." },
                "vtail_position_percent": { "type": "number", "description": "Vertical tail station fraction. Defaults to 0.65." },
                "cg_position_percent": { "type": "number", "description": "Center of gravity station fraction. Defaults to 0.35." },
                "wing_z": { "type": "number", "description": "Wing vertical station (ft). Defaults to 0." },
                "htail_z": { "type": "number", "description": "Horizontal tail vertical station (ft). Defaults to 0." },
                "vtail_z": { "type": "number", "description": "Vertical tail vertical station (ft). Defaults to 0." }
            },
            "required": ["fuselage_length"],
            "additionalProperties": false
        }),
    }
}

fn def_body_geometry() -> ToolDefinition {
    ToolDefinition {
        name: "define_body_geometry".to_string(),
        description: "Generate axisymmetric fuselage stations for the DATCOM $BODY namelist \
                      from overall dimensions."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "fuselage_length": { "type": "number", "description": "Total fuselage length (ft)." },
                "max_diameter": { "type": "number", "description": "Maximum fuselage diameter (ft)." },
                "nose_length": { "type": "number", "description": "Nose cone length (ft). Defaults to 20% of the body." },
                "tail_length": { "type": "number", "description": "Boattail length (ft). Defaults to 20% of the body." },
                "n_stations": { "type": "integer", "description": "Number of stations (2-20). Defaults to 10." }
            },
            "required": ["fuselage_length", "max_diameter"],
            "additionalProperties": false
        }),
    }
}

fn def_fltcon_matrix() -> ToolDefinition {
    ToolDefinition {
        name: "generate_fltcon_matrix".to_string(),
        description: "Generate the flight-condition matrix for the DATCOM $FLTCON namelist. \
                      NMACH * NALT * NALPHA must not exceed 400 analysis points."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "mach_numbers": {
                    "type": "array",
                    "items": { "type": "number" },
                    "minItems": 1,
                    "description": "Mach numbers for analysis."
                },
                "altitudes": {
                    "type": "array",
                    "items": { "type": "number" },
                    "minItems": 1,
                    "description": "Altitudes in feet."
                },
                "alpha_range": {
                    "type": "array",
                    "items": { "type": "number" },
                    "minItems": 3,
                    "maxItems": 3,
                    "description": "[start, end, step] angle-of-attack sweep in degrees."
                },
                "weight": { "type": "number", "description": "Aircraft weight (lbs)." },
                "loop_mode": { "type": "number", "description": "Loop mode. Defaults to 2.0 (Mach-priority)." }
            },
            "required": ["mach_numbers", "altitudes", "alpha_range", "weight"],
            "additionalProperties": false
        }),
    }
}

fn def_validate_parameters() -> ToolDefinition {
    ToolDefinition {
        name: "validate_datcom_parameters".to_string(),
        description: "Cross-field sanity check over a dictionary of DATCOM parameters. \
                      Returns a PASS/FAIL report with errors and warnings; a FAIL does \
                      not block file generation."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "params": {
                    "type": "object",
                    "description": "Aggregated parameter record from the conversion tools."
                }
            },
            "required": ["params"],
            "additionalProperties": false
        }),
    }
}
