use json::JsonValue;
use log::{info, warn};

use crate::{
    datatypes::{PlateMaterial, Vertex, PLATE_DOF},
    error::{FemError, Result},
    mesher::subdivisions_from_real,
    solver::{Constraints, IterationObserver, SolveMethod, SolverConfig},
};

/// Nodes this close to a region boundary count as inside it
pub const REGION_TOLERANCE: f64 = 1e-9;

/// Geometry, material and loading of a rectangular plate model
#[derive(Debug, Clone, PartialEq)]
pub struct PlateMetadata {
    pub material: PlateMaterial,
    pub width: f64,
    pub height: f64,
    pub nx: usize,
    pub ny: usize,
    /// Uniform transverse pressure, positive along +w
    pub distributed_load: f64,
}

/// Axis-aligned box selecting the nodes a rule applies to
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryRegion {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Default for BoundaryRegion {
    fn default() -> Self {
        Self {
            x_min: f64::MIN,
            x_max: f64::MAX,
            y_min: f64::MIN,
            y_max: f64::MAX,
        }
    }
}

impl BoundaryRegion {
    pub fn contains(&self, vertex: &Vertex) -> bool {
        vertex.x >= self.x_min - REGION_TOLERANCE
            && vertex.x <= self.x_max + REGION_TOLERANCE
            && vertex.y >= self.y_min - REGION_TOLERANCE
            && vertex.y <= self.y_max + REGION_TOLERANCE
    }
}

/// A plate DOF that a boundary rule can fix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlateDof {
    W,
    ThetaX,
    ThetaY,
}

impl PlateDof {
    pub fn offset(&self) -> usize {
        match self {
            PlateDof::W => 0,
            PlateDof::ThetaX => 1,
            PlateDof::ThetaY => 2,
        }
    }

    fn from_name(name: &str) -> Option<PlateDof> {
        match name {
            "w" => Some(PlateDof::W),
            "theta_x" => Some(PlateDof::ThetaX),
            "theta_y" => Some(PlateDof::ThetaY),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryRule {
    pub name: String,
    pub region: BoundaryRegion,
    pub targets: Vec<PlateDof>,
}

/// Everything needed to run a plate analysis
#[derive(Debug, Clone, PartialEq)]
pub struct PlateModel {
    pub metadata: PlateMetadata,
    pub solver: SolverConfig,
    pub rules: Vec<BoundaryRule>,
}

/// Loads the input file into a json object
///
/// # Arguments
/// * `input_file` - The path to the input file
///
/// # Returns
/// A JsonValue object
pub fn load_input_file(input_file: &str) -> Result<JsonValue> {
    let file_string = match std::fs::read_to_string(input_file) {
        Ok(f) => f,
        Err(err) => {
            return Err(FemError::Input(format!(
                "Unable to open input file {input_file}: {err}"
            )))
        }
    };

    parse_input_string(&file_string)
}

/// Parses input json text and checks that the required sections exist
pub fn parse_input_string(text: &str) -> Result<JsonValue> {
    let input_json = match json::parse(text) {
        Ok(f) => f,
        Err(err) => {
            return Err(FemError::Input(format!(
                "Error in input file json: {err}"
            )))
        }
    };

    for section in ["metadata", "boundary_conditions"] {
        if !input_json.has_key(section) {
            return Err(FemError::Input(format!(
                "Input json missing {section} field"
            )));
        }
    }

    Ok(input_json)
}

fn required_f64(section: &JsonValue, field: &str) -> Result<f64> {
    if !section.has_key(field) {
        return Err(FemError::Input(format!(
            "Input json missing {field} field in metadata section"
        )));
    }
    match section[field].as_f64() {
        Some(value) if value.is_finite() => Ok(value),
        _ => Err(FemError::Input(format!(
            "Bad value for {field} in metadata section"
        ))),
    }
}

/// Parses plate metadata from the input json
///
/// # Arguments
/// * `input_json`: The input file as a JsonValue object
///
/// # Returns
/// A PlateMetadata instance
pub fn parse_input_metadata(input_json: &JsonValue) -> Result<PlateMetadata> {
    let metadata = &input_json["metadata"];

    let youngs_modulus = required_f64(metadata, "youngs_modulus")?;
    let poisson_ratio = required_f64(metadata, "poisson_ratio")?;
    let part_thickness = required_f64(metadata, "part_thickness")?;
    let width = required_f64(metadata, "width")?;
    let height = required_f64(metadata, "height")?;
    let nx = subdivisions_from_real(required_f64(metadata, "nx")?)?;
    let ny = subdivisions_from_real(required_f64(metadata, "ny")?)?;
    let distributed_load = required_f64(metadata, "distributed_load")?;

    if !(0.0..0.5).contains(&poisson_ratio) {
        return Err(FemError::Input(format!(
            "poisson_ratio must be in [0, 0.5), got {poisson_ratio}"
        )));
    }

    Ok(PlateMetadata {
        material: PlateMaterial {
            youngs_modulus,
            poisson_ratio,
            thickness: part_thickness,
        },
        width,
        height,
        nx,
        ny,
        distributed_load,
    })
}

/// Parses the optional solver section, falling back to defaults
pub fn parse_solver_config(input_json: &JsonValue) -> Result<SolverConfig> {
    let mut config = SolverConfig::default();
    let solver = &input_json["solver"];
    if solver.is_null() {
        return Ok(config);
    }

    if solver.has_key("method") {
        config.method = match solver["method"].as_str() {
            Some("penalty") => SolveMethod::Penalty,
            Some("reduction") => SolveMethod::Reduction,
            _ => {
                return Err(FemError::Input(format!(
                    "Unknown solver method {}; expected \"penalty\" or \"reduction\"",
                    solver["method"].dump()
                )))
            }
        };
    }
    if solver.has_key("penalty") {
        config.penalty = match solver["penalty"].as_f64() {
            Some(p) if p > 0.0 => p,
            _ => return Err(FemError::Input("Bad value for penalty in solver section".to_owned())),
        };
    }
    if solver.has_key("tolerance") {
        config.tolerance = match solver["tolerance"].as_f64() {
            Some(t) if t > 0.0 => t,
            _ => {
                return Err(FemError::Input(
                    "Bad value for tolerance in solver section".to_owned(),
                ))
            }
        };
    }
    if solver.has_key("observer") {
        config.observer = match solver["observer"].as_str().and_then(IterationObserver::from_name) {
            Some(observer) => observer,
            None => {
                return Err(FemError::Input(format!(
                    "Unknown solver observer {}; expected \"silent\", \"progress\" or \"terminal\"",
                    solver["observer"].dump()
                )))
            }
        };
    }
    if solver.has_key("max_iterations") {
        config.max_iterations = match solver["max_iterations"].as_u64() {
            Some(n) if n > 0 => n,
            _ => {
                return Err(FemError::Input(
                    "Bad value for max_iterations in solver section".to_owned(),
                ))
            }
        };
    }

    Ok(config)
}

fn region_bound(name: &str, region: &JsonValue, field: &str, default: f64) -> Result<f64> {
    if !region.has_key(field) {
        return Ok(default);
    }
    region[field]
        .as_f64()
        .ok_or_else(|| FemError::Input(format!("Bad value for {field} in {name}")))
}

/// Parses the named boundary rules from the input json
pub fn parse_boundary_rules(input_json: &JsonValue) -> Result<Vec<BoundaryRule>> {
    let mut rules: Vec<BoundaryRule> = Vec::new();

    // Load rules from json
    for (name, rule_json) in input_json["boundary_conditions"].entries() {
        if !rule_json.has_key("region") {
            return Err(FemError::Input(format!(
                "Boundary rule {name} is missing region field"
            )));
        }
        if !rule_json.has_key("targets") {
            return Err(FemError::Input(format!(
                "Boundary rule {name} is missing targets field"
            )));
        }

        let region_json = &rule_json["region"];
        let unbounded = BoundaryRegion::default();
        let region = BoundaryRegion {
            x_min: region_bound(name, region_json, "x_target_min", unbounded.x_min)?,
            x_max: region_bound(name, region_json, "x_target_max", unbounded.x_max)?,
            y_min: region_bound(name, region_json, "y_target_min", unbounded.y_min)?,
            y_max: region_bound(name, region_json, "y_target_max", unbounded.y_max)?,
        };

        if region.x_min > region.x_max {
            return Err(FemError::Input(format!(
                "Boundary '{name}' has x_target_min greater than x_target_max"
            )));
        }
        if region.y_min > region.y_max {
            return Err(FemError::Input(format!(
                "Boundary '{name}' has y_target_min greater than y_target_max"
            )));
        }

        if !rule_json["targets"].is_array() {
            return Err(FemError::Input(format!(
                "Boundary '{name}' targets must be an array of dof names"
            )));
        }
        let mut targets = Vec::new();
        for target in rule_json["targets"].members() {
            let dof = target.as_str().and_then(PlateDof::from_name).ok_or_else(|| {
                FemError::Input(format!(
                    "Boundary '{name}' has unknown target {}; expected w, theta_x or theta_y",
                    target.dump()
                ))
            })?;
            if !targets.contains(&dof) {
                targets.push(dof);
            }
        }
        if targets.is_empty() {
            warn!("boundary rule '{name}' fixes no dofs");
        }

        rules.push(BoundaryRule {
            name: name.to_string(),
            region,
            targets,
        })
    }

    info!("loaded {} boundary rules from input file", rules.len());

    Ok(rules)
}

/// Parses a complete plate model from the input json
pub fn parse_plate_model(input_json: &JsonValue) -> Result<PlateModel> {
    Ok(PlateModel {
        metadata: parse_input_metadata(input_json)?,
        solver: parse_solver_config(input_json)?,
        rules: parse_boundary_rules(input_json)?,
    })
}

/// Reads and parses a plate model from a json input file
pub fn load_plate_model(input_file: &str) -> Result<PlateModel> {
    let input_json = load_input_file(input_file)?;
    parse_plate_model(&input_json)
}

/// Fixes the targeted dofs of every node inside a rule's region
///
/// # Arguments
/// * `rules` - The boundary rules
/// * `nodes` - The mesh nodes
///
/// # Returns
/// The resulting constraint set. Rules are cumulative.
pub fn apply_boundary_conditions(rules: &[BoundaryRule], nodes: &[Vertex]) -> Constraints {
    let mut constraints = Constraints::new();
    let offsets: Vec<Vec<usize>> = rules
        .iter()
        .map(|rule| rule.targets.iter().map(PlateDof::offset).collect())
        .collect();

    for (i, node) in nodes.iter().enumerate() {
        for (rule, rule_offsets) in rules.iter().zip(&offsets) {
            if rule.region.contains(node) {
                constraints.fix_node_dofs(i, PLATE_DOF, rule_offsets);
            }
        }
    }

    constraints
}

/// Lumps a uniform pressure onto the w dof of every node
///
/// Each node receives an equal share `q * (width * height) / num_nodes`.
pub fn distributed_loads(metadata: &PlateMetadata, num_nodes: usize) -> Vec<f64> {
    let mut loads = vec![0.0; num_nodes * PLATE_DOF];
    if num_nodes == 0 {
        return loads;
    }
    let nodal_load = metadata.distributed_load * (metadata.width * metadata.height) / num_nodes as f64;
    for node in 0..num_nodes {
        loads[node * PLATE_DOF + PlateDof::W.offset()] = nodal_load;
    }
    loads
}
