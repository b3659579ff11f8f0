use std::collections::{HashMap, HashSet, VecDeque};

use serde::Serialize;
use tracing::{debug, info};

use crate::constants::PROJECT_UNREACHABLE_MESSAGE;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ValidationStatus {
    #[default]
    Unknown,
    Validating,
    Valid,
    Invalid,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationState {
    pub status: ValidationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepSummary {
    pub attempted: usize,
    pub valid: usize,
    pub invalid: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationEffect {
    Dispatch(String),
    SweepFinished(SweepSummary),
}

#[derive(Debug, Default)]
struct ValidationSweep {
    queue: VecDeque<String>,
    queued: HashSet<String>,
    in_flight: Option<String>,
    forced: bool,
    summary: SweepSummary,
}

/// Tracks reachability per project and decides when a remote validation
/// call may be dispatched.
///
/// Direct requests run immediately. "Validate all" and auto-validation share
/// one sequential sweep so at most one sweep request is in flight.
#[derive(Debug, Default)]
pub struct ValidationOrchestrator {
    states: HashMap<String, ValidationState>,
    observed_ids: Option<Vec<String>>,
    sweep: Option<ValidationSweep>,
}

impl ValidationOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, project_id: &str) -> ValidationState {
        self.states.get(project_id).cloned().unwrap_or_default()
    }

    pub fn status(&self, project_id: &str) -> ValidationStatus {
        self.states
            .get(project_id)
            .map(|state| state.status)
            .unwrap_or_default()
    }

    pub fn is_sweeping(&self) -> bool {
        self.sweep.is_some()
    }

    /// Single-project validation. Returns the dispatch to perform, if any.
    pub fn request(&mut self, project_id: &str, force: bool) -> Option<ValidationEffect> {
        let state = self.states.entry(project_id.to_string()).or_default();
        match state.status {
            ValidationStatus::Validating => {
                debug!(project_id, "validation already in flight; skipping");
                None
            }
            ValidationStatus::Valid if !force => None,
            _ => {
                state.status = ValidationStatus::Validating;
                state.error = None;
                Some(ValidationEffect::Dispatch(project_id.to_string()))
            }
        }
    }

    /// Starts a sequential sweep over `project_ids`. A sweep already running
    /// absorbs the call.
    pub fn validate_all(&mut self, project_ids: &[String]) -> Vec<ValidationEffect> {
        if self.sweep.is_some() {
            debug!("validation sweep already running");
            return Vec::new();
        }
        info!(count = project_ids.len(), "starting validation sweep");
        let mut sweep = ValidationSweep {
            forced: true,
            ..ValidationSweep::default()
        };
        for project_id in project_ids {
            if sweep.queued.insert(project_id.clone()) {
                sweep.queue.push_back(project_id.clone());
            }
        }
        self.sweep = Some(sweep);
        self.advance_sweep()
    }

    /// Auto-validation for a newly observed project set. Only ids that were
    /// never checked are queued; unchanged sets do nothing.
    pub fn observe_projects(&mut self, project_ids: &[String]) -> Vec<ValidationEffect> {
        let mut signature = project_ids.to_vec();
        signature.sort();
        signature.dedup();
        if self.observed_ids.as_ref() == Some(&signature) {
            return Vec::new();
        }

        let current = signature.iter().cloned().collect::<HashSet<_>>();
        self.states.retain(|project_id, _| current.contains(project_id));
        self.observed_ids = Some(signature);

        let unchecked = project_ids
            .iter()
            .filter(|project_id| self.status(project_id) == ValidationStatus::Unknown)
            .cloned()
            .collect::<Vec<_>>();
        if unchecked.is_empty() {
            return Vec::new();
        }

        match self.sweep.as_mut() {
            Some(sweep) => {
                for project_id in unchecked {
                    if sweep.queued.insert(project_id.clone()) {
                        sweep.queue.push_back(project_id);
                    }
                }
                Vec::new()
            }
            None => {
                let mut sweep = ValidationSweep::default();
                for project_id in unchecked {
                    if sweep.queued.insert(project_id.clone()) {
                        sweep.queue.push_back(project_id);
                    }
                }
                self.sweep = Some(sweep);
                self.advance_sweep()
            }
        }
    }

    /// Applies a validation outcome. `Err` is a rejected remote call, as
    /// opposed to a `false` reachability answer.
    pub fn complete(
        &mut self,
        project_id: &str,
        outcome: Result<bool, String>,
    ) -> Vec<ValidationEffect> {
        let valid = matches!(outcome, Ok(true));
        if let Some(state) = self.states.get_mut(project_id) {
            *state = match outcome {
                Ok(true) => ValidationState {
                    status: ValidationStatus::Valid,
                    error: None,
                },
                Ok(false) => ValidationState {
                    status: ValidationStatus::Invalid,
                    error: Some(PROJECT_UNREACHABLE_MESSAGE.to_string()),
                },
                Err(message) => ValidationState {
                    status: ValidationStatus::Invalid,
                    error: Some(message),
                },
            };
        } else {
            debug!(project_id, "dropping validation result for removed project");
        }

        let Some(sweep) = self.sweep.as_mut() else {
            return Vec::new();
        };
        if sweep.in_flight.as_deref() != Some(project_id) {
            return Vec::new();
        }
        sweep.in_flight = None;
        sweep.summary.attempted += 1;
        if valid {
            sweep.summary.valid += 1;
        } else {
            sweep.summary.invalid += 1;
        }
        self.advance_sweep()
    }

    fn advance_sweep(&mut self) -> Vec<ValidationEffect> {
        loop {
            let Some(sweep) = self.sweep.as_mut() else {
                return Vec::new();
            };
            if sweep.in_flight.is_some() {
                return Vec::new();
            }
            let Some(project_id) = sweep.queue.pop_front() else {
                let summary = sweep.summary;
                self.sweep = None;
                info!(
                    attempted = summary.attempted,
                    valid = summary.valid,
                    invalid = summary.invalid,
                    "validation sweep finished"
                );
                return vec![ValidationEffect::SweepFinished(summary)];
            };
            let forced = sweep.forced;

            if let Some(observed) = self.observed_ids.as_ref() {
                if observed.binary_search(&project_id).is_err() {
                    continue;
                }
            }

            let status = self.status(&project_id);
            if status == ValidationStatus::Validating {
                if let Some(sweep) = self.sweep.as_mut() {
                    sweep.in_flight = Some(project_id);
                }
                return Vec::new();
            }
            if !forced && status != ValidationStatus::Unknown {
                continue;
            }

            let dispatch = self.request(&project_id, forced);
            if let Some(sweep) = self.sweep.as_mut() {
                sweep.in_flight = Some(project_id);
            }
            return dispatch.into_iter().collect();
        }
    }
}
