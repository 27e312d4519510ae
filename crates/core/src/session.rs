//! Takeoff session
//!
//! One user's in-memory measuring state: the loaded plan, the drawing
//! surface, the calibration and the measurement ledger. Tool actions are
//! handled to completion one at a time; a rejected action changes nothing.

use crate::calibration::{Calibration, CalibrationError, Unit};
use crate::config::TakeoffConfig;
use crate::drawing::{DrawingSurface, Shape};
use crate::geometry::{close_ring, polygon_area, polyline_length, PixelPoint};
use crate::measurement::{
    LedgerError, Measurement, MeasurementKind, MeasurementLedger, COUNT_UNIT,
};
use crate::plan::{load_plan, Plan, PlanError, PlanSource};
use plan_render::PlanRenderer;
use std::fmt;
use tracing::{info, warn};

/// Measuring tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    Calibrate,
    Length,
    Area,
    Count,
}

impl Tool {
    /// Points the active path needs before the tool can act
    pub fn required_points(&self) -> usize {
        match self {
            Tool::Calibrate | Tool::Length => 2,
            Tool::Area => 3,
            Tool::Count => 0,
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Tool::Calibrate => "calibration",
            Tool::Length => "length",
            Tool::Area => "area",
            Tool::Count => "count",
        })
    }
}

/// Where the session is in its workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No plan loaded
    Idle,
    /// Plan loaded, no tool in use
    Ready,
    /// A tool is selected, or its last action was rejected
    Active(Tool),
}

/// A tool button press with its user input
#[derive(Debug, Clone, PartialEq)]
pub enum ToolAction {
    /// Set the scale from the active path and its known real length
    Calibrate { reference_length: f64 },
    /// Record the length of the active path
    Length { label: String },
    /// Record the area enclosed by the active path
    Area { label: String },
    /// Record a number of items
    Count { label: String, count: i64 },
}

impl ToolAction {
    pub fn tool(&self) -> Tool {
        match self {
            ToolAction::Calibrate { .. } => Tool::Calibrate,
            ToolAction::Length { .. } => Tool::Length,
            ToolAction::Area { .. } => Tool::Area,
            ToolAction::Count { .. } => Tool::Count,
        }
    }
}

/// Result of an accepted action
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Calibrated { pixels_per_unit: f64 },
    Recorded(Measurement),
}

/// Why an action or load was rejected. The message is meant for the user.
#[derive(Debug, thiserror::Error)]
pub enum TakeoffError {
    #[error("load a plan first")]
    NoPlanLoaded,
    #[error("draw a path with at least {required} points for {tool} (found {found})")]
    TooFewPoints { tool: Tool, required: usize, found: usize },
    #[error("enter a positive count")]
    NonPositiveCount(i64),
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Plan(#[from] PlanError),
}

impl TakeoffError {
    /// True for rejections caused by missing or invalid user input
    pub fn is_input_insufficient(&self) -> bool {
        !matches!(self, TakeoffError::Plan(_))
    }
}

/// State bundle for one measuring session
#[derive(Debug)]
pub struct TakeoffSession {
    config: TakeoffConfig,
    state: SessionState,
    plan: Option<Plan>,
    surface: DrawingSurface,
    calibration: Calibration,
    ledger: MeasurementLedger,
}

impl Default for TakeoffSession {
    fn default() -> Self {
        Self::new()
    }
}

impl TakeoffSession {
    pub fn new() -> Self {
        Self::with_config(TakeoffConfig::default())
    }

    pub fn with_config(config: TakeoffConfig) -> Self {
        let calibration = Calibration::new(config.default_unit.clone());
        Self {
            config,
            state: SessionState::Idle,
            plan: None,
            surface: DrawingSurface::new(),
            calibration,
            ledger: MeasurementLedger::new(),
        }
    }

    pub fn config(&self) -> &TakeoffConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn plan(&self) -> Option<&Plan> {
        self.plan.as_ref()
    }

    /// Page index new measurements are tagged with
    pub fn page(&self) -> u32 {
        self.plan.as_ref().map_or(0, Plan::page_index)
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn ledger(&self) -> &MeasurementLedger {
        &self.ledger
    }

    pub fn surface(&self) -> &DrawingSurface {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut DrawingSurface {
        &mut self.surface
    }

    /// Add a stroke to the drawing surface
    pub fn draw(&mut self, shape: Shape) {
        self.surface.push(shape);
    }

    /// Load a new plan or page. On failure the session keeps its previous plan.
    pub fn load_plan<R: PlanRenderer + ?Sized>(
        &mut self,
        renderer: &R,
        source: &PlanSource,
    ) -> Result<&Plan, TakeoffError> {
        let plan = load_plan(renderer, source)?;
        Ok(self.set_plan(plan))
    }

    /// Install an already decoded plan. Clears the drawing surface; the
    /// calibration and ledger carry over.
    pub fn set_plan(&mut self, plan: Plan) -> &Plan {
        self.surface.clear();
        self.state = SessionState::Ready;
        self.plan.insert(plan)
    }

    pub fn select_tool(&mut self, tool: Tool) -> Result<(), TakeoffError> {
        self.ensure_plan()?;
        self.state = SessionState::Active(tool);
        Ok(())
    }

    /// Leave the current tool without acting
    pub fn cancel_tool(&mut self) {
        if self.plan.is_some() {
            self.state = SessionState::Ready;
        }
    }

    pub fn set_unit(&mut self, unit: Unit) {
        self.calibration.set_unit(unit);
    }

    /// Enter the scale directly instead of drawing a reference line
    pub fn set_pixels_per_unit(&mut self, pixels_per_unit: f64) -> Result<(), TakeoffError> {
        self.calibration.set_pixels_per_unit(pixels_per_unit)?;
        Ok(())
    }

    /// Run a tool action against the most recently drawn path.
    ///
    /// On success the session returns to [`SessionState::Ready`]; on
    /// rejection it stays on the tool and nothing else changes.
    pub fn apply(&mut self, action: ToolAction) -> Result<ActionOutcome, TakeoffError> {
        let tool = action.tool();
        self.ensure_plan()?;
        self.state = SessionState::Active(tool);

        let result = match action {
            ToolAction::Calibrate { reference_length } => self.calibrate(reference_length),
            ToolAction::Length { label } => self.record_length(&label),
            ToolAction::Area { label } => self.record_area(&label),
            ToolAction::Count { label, count } => self.record_count(&label, count),
        };

        match &result {
            Ok(_) => self.state = SessionState::Ready,
            Err(err) => warn!(%tool, error = %err, "action rejected"),
        }
        result
    }

    /// Clear the ledger only
    pub fn clear_measurements(&mut self) {
        self.ledger.clear();
    }

    /// Back to defaults: uncalibrated, empty ledger, blank surface. The plan stays.
    pub fn reset(&mut self) {
        self.calibration.reset(self.config.default_unit.clone());
        self.ledger.clear();
        self.surface.clear();
        if self.plan.is_some() {
            self.state = SessionState::Ready;
        }
        info!("session reset");
    }

    fn ensure_plan(&self) -> Result<(), TakeoffError> {
        if self.plan.is_none() {
            warn!("no plan loaded");
            return Err(TakeoffError::NoPlanLoaded);
        }
        Ok(())
    }

    fn active_path(&self, tool: Tool) -> Result<Vec<PixelPoint>, TakeoffError> {
        let points = self.surface.active_path();
        let required = tool.required_points();
        if points.len() < required {
            return Err(TakeoffError::TooFewPoints { tool, required, found: points.len() });
        }
        Ok(points)
    }

    fn calibrate(&mut self, reference_length: f64) -> Result<ActionOutcome, TakeoffError> {
        let points = self.active_path(Tool::Calibrate)?;
        let pixel_length = polyline_length(&points);
        let pixels_per_unit = self.calibration.set_from_reference(pixel_length, reference_length)?;
        Ok(ActionOutcome::Calibrated { pixels_per_unit })
    }

    fn record_length(&mut self, label: &str) -> Result<ActionOutcome, TakeoffError> {
        let points = self.active_path(Tool::Length)?;
        let value = self.calibration.to_length(polyline_length(&points));
        let unit = self.calibration.unit().symbol().to_string();
        self.record(MeasurementKind::Length, label, unit, value)
    }

    fn record_area(&mut self, label: &str) -> Result<ActionOutcome, TakeoffError> {
        let points = self.active_path(Tool::Area)?;
        let ring = close_ring(&points);
        let value = self.calibration.to_area(polygon_area(&ring));
        let unit = self.calibration.unit().area_symbol();
        self.record(MeasurementKind::Area, label, unit, value)
    }

    fn record_count(&mut self, label: &str, count: i64) -> Result<ActionOutcome, TakeoffError> {
        if count <= 0 {
            return Err(TakeoffError::NonPositiveCount(count));
        }
        self.record(MeasurementKind::Count, label, COUNT_UNIT.to_string(), count as f64)
    }

    fn record(
        &mut self,
        kind: MeasurementKind,
        label: &str,
        unit: String,
        value: f64,
    ) -> Result<ActionOutcome, TakeoffError> {
        let page = self.page();
        let measurement = self.ledger.append(kind, label, unit, value, page)?;
        Ok(ActionOutcome::Recorded(measurement.clone()))
    }
}
