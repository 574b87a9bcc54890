use std::sync::Arc;

use indexmap::IndexMap;
use log::{debug, info, warn};
use serde_json::Value;

use crate::build_ref::BuildRef;
use crate::error::{Result, StageViewError};

use super::sources::{ApprovalRegistry, BoundParameters};
use super::types::{Approval, ParameterType, ParameterValue, RequiredParameter};

/// Raw values submitted for an approval, keyed by parameter name.
pub type SubmittedValues = IndexMap<String, Value>;

/// Submit/abort entry point for pending approvals.
///
/// Outcomes are binary: `true` only when the registry confirms the
/// resolution or cancellation. Exactly-once semantics per approval id are
/// provided by the registry; this type adds no locking.
pub struct ApprovalController {
    registry: Arc<dyn ApprovalRegistry>,
}

impl ApprovalController {
    pub fn new(registry: Arc<dyn ApprovalRegistry>) -> Self {
        Self { registry }
    }

    pub async fn submit(&self, build: &BuildRef, approval_id: &str, values: &SubmittedValues) -> bool {
        let Some(approval) = self.find_pending(build, approval_id).await else {
            return false;
        };

        let parameters = bind_parameters(&approval.parameters, values);

        match self.registry.resolve(build, approval_id, &parameters).await {
            Ok(true) => {
                info!("Approval {approval_id} of {build} submitted");
                true
            }
            Ok(false) => {
                warn!("Approval {approval_id} of {build} was already resolved");
                false
            }
            Err(e) => {
                warn!("Failed to submit approval {approval_id} of {build}: {e}");
                false
            }
        }
    }

    pub async fn abort(&self, build: &BuildRef, approval_id: &str) -> bool {
        if self.find_pending(build, approval_id).await.is_none() {
            return false;
        }

        match self.registry.cancel(build, approval_id).await {
            Ok(true) => {
                info!("Approval {approval_id} of {build} aborted");
                true
            }
            Ok(false) => {
                warn!("Approval {approval_id} of {build} was already resolved");
                false
            }
            Err(e) => {
                warn!("Failed to abort approval {approval_id} of {build}: {e}");
                false
            }
        }
    }

    async fn find_pending(&self, build: &BuildRef, approval_id: &str) -> Option<Approval> {
        let pending = match self.registry.list_pending(build).await {
            Ok(pending) => pending,
            Err(e) => {
                warn!("Cannot list approvals of {build}: {e}");
                return None;
            }
        };

        let found = pending.into_iter().find(|approval| approval.id == approval_id);
        if found.is_none() {
            debug!(
                "{}",
                StageViewError::ApprovalNotFound(format!("{approval_id} in {build}"))
            );
        }
        found
    }
}

/// Binds submitted values to the declared parameters, in declaration order.
///
/// Keys that match no parameter are ignored. Missing or uncoercible values
/// fall back to the parameter's default.
pub fn bind_parameters(parameters: &[RequiredParameter], values: &SubmittedValues) -> BoundParameters {
    parameters
        .iter()
        .map(|parameter| {
            let value = match values.get(&parameter.name) {
                Some(raw) => coerce(parameter, raw).unwrap_or_else(|e| {
                    warn!("{e}, using default");
                    default_value(parameter)
                }),
                None => {
                    if parameter.required {
                        debug!("Required parameter {} missing, using default", parameter.name);
                    }
                    default_value(parameter)
                }
            };
            (parameter.name.clone(), value)
        })
        .collect()
}

/// Coerces one raw value to the parameter's declared type.
///
/// # Errors
///
/// Returns `StageViewError::Coercion` when the value cannot represent the type.
pub fn coerce(parameter: &RequiredParameter, raw: &Value) -> Result<ParameterValue> {
    let failure = |reason: &str| StageViewError::Coercion {
        parameter: parameter.name.clone(),
        reason: reason.to_string(),
    };

    match parameter.declared_type {
        ParameterType::Boolean => match raw {
            Value::Bool(value) => Ok(ParameterValue::Boolean(*value)),
            Value::String(text) => parse_bool(text)
                .map(ParameterValue::Boolean)
                .ok_or_else(|| failure(&format!("'{text}' is not a boolean"))),
            _ => Err(failure("expected a boolean")),
        },
        ParameterType::String
        | ParameterType::Text
        | ParameterType::Password
        | ParameterType::Choice
        | ParameterType::Other => match raw {
            Value::String(text) => Ok(ParameterValue::Text(text.clone())),
            Value::Number(number) => Ok(ParameterValue::Text(number.to_string())),
            Value::Bool(value) => Ok(ParameterValue::Text(value.to_string())),
            Value::Null => Err(failure("null is not a value")),
            Value::Array(_) | Value::Object(_) => Err(failure("expected a scalar")),
        },
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("true") {
        Some(true)
    } else if text.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn default_value(parameter: &RequiredParameter) -> ParameterValue {
    match (parameter.declared_type, &parameter.default_value) {
        (ParameterType::Boolean, Some(ParameterValue::Boolean(value))) => {
            ParameterValue::Boolean(*value)
        }
        (ParameterType::Boolean, Some(ParameterValue::Text(text))) => {
            ParameterValue::Boolean(parse_bool(text).unwrap_or(false))
        }
        (ParameterType::Boolean, None) => ParameterValue::Boolean(false),
        (_, Some(ParameterValue::Text(text))) => ParameterValue::Text(text.clone()),
        (_, Some(ParameterValue::Boolean(value))) => ParameterValue::Text(value.to_string()),
        (_, None) => ParameterValue::Text(String::new()),
    }
}
