use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub const MIN_STEPS: usize = 2;
/// Each step adds a self-join, so the chain length is capped.
pub const MAX_STEPS: usize = 8;
pub const MAX_STEP_VALUE_LEN: usize = 500;
pub const MAX_STEP_NAME_LEN: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Matches pageviews whose `pathname` equals the step value.
    Page,
    /// Matches custom events whose `event_name` equals the step value.
    Event,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunnelStep {
    pub value: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: StepKind,
    #[serde(default)]
    pub hostname: Option<String>,
}

impl FunnelStep {
    /// Display label, falling back to the matched value.
    pub fn label(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.value)
    }
}

/// Body of `POST /api/v1/funnel`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FunnelRequest {
    #[serde(default)]
    pub steps: Vec<FunnelStep>,
}

/// An ordered, validated list of at least two steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunnelDefinition {
    steps: Vec<FunnelStep>,
}

impl FunnelDefinition {
    pub fn new(steps: Vec<FunnelStep>) -> Result<Self, ValidationError> {
        if steps.len() < MIN_STEPS {
            return Err(ValidationError::single(
                "steps",
                "At least 2 steps are required for a funnel",
            ));
        }
        if steps.len() > MAX_STEPS {
            return Err(ValidationError::single(
                "steps",
                format!("A funnel can have at most {MAX_STEPS} steps"),
            ));
        }
        let mut errors = ValidationError::new();
        for (idx, step) in steps.iter().enumerate() {
            let field = format!("steps.{idx}.value");
            if step.value.is_empty() {
                errors.push(field, "step value must not be empty");
            } else if step.value.len() > MAX_STEP_VALUE_LEN {
                errors.push(field, format!("step value must be at most {MAX_STEP_VALUE_LEN} characters"));
            }
            if step.name.as_ref().is_some_and(|n| n.len() > MAX_STEP_NAME_LEN) {
                errors.push(
                    format!("steps.{idx}.name"),
                    format!("step name must be at most {MAX_STEP_NAME_LEN} characters"),
                );
            }
            if step.hostname.as_deref() == Some("") {
                errors.push(format!("steps.{idx}.hostname"), "hostname must not be empty");
            }
        }
        errors.into_result(Self { steps })
    }

    pub fn steps(&self) -> &[FunnelStep] {
        &self.steps
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelStepResult {
    pub step_number: u32,
    pub step_name: String,
    pub visitors: i64,
    /// Percentage of step-1 visitors, two decimals.
    pub conversion_rate: f64,
    /// Percentage lost since the previous step, two decimals. Always 0 for step 1.
    pub dropoff_rate: f64,
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Turn per-step session counts into result rows.
pub fn compute_funnel_results(funnel: &FunnelDefinition, visitors: &[i64]) -> Vec<FunnelStepResult> {
    let entered = *visitors.first().unwrap_or(&0);

    funnel
        .steps()
        .iter()
        .enumerate()
        .map(|(idx, step)| {
            let reached = *visitors.get(idx).unwrap_or(&0);
            let conversion_rate = if entered > 0 {
                round2(reached as f64 / entered as f64 * 100.0)
            } else {
                0.0
            };
            let dropoff_rate = match idx.checked_sub(1).and_then(|p| visitors.get(p)) {
                Some(&previous) if entered > 0 && previous > 0 => {
                    round2((1.0 - reached as f64 / previous as f64) * 100.0)
                }
                _ => 0.0,
            };
            FunnelStepResult {
                step_number: idx as u32 + 1,
                step_name: step.label().to_string(),
                visitors: reached,
                conversion_rate,
                dropoff_rate,
            }
        })
        .collect()
}
