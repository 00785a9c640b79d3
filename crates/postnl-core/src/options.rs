//! Options flow
//!
//! Single-step flow for editing entry options. Without input it returns
//! the form; with input it validates and returns the new options.

use serde::Serialize;
use serde_json::{Value, json};

use crate::config::{DEFAULT_UPDATE_INTERVAL_SECS, EntryOptions, MIN_UPDATE_INTERVAL_SECS};
use crate::error::{Error, Result};

pub const STEP_INIT: &str = "init";

/// Outcome of one flow step
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowResult {
    /// Ask the user for input
    Form { step_id: String, schema: Value },

    /// Options accepted
    CreateEntry { title: String, data: EntryOptions },
}

#[derive(Debug, Clone, Default)]
pub struct OptionsFlow {
    current: Option<EntryOptions>,
}

impl OptionsFlow {
    /// Flow for an entry with these options (`None` when never set)
    pub fn new(current: Option<EntryOptions>) -> Self {
        Self { current }
    }

    /// Handle the `init` step
    ///
    /// # Errors
    ///
    /// `Error::InvalidInput` if `update_interval` is not a number (or integer
    /// string), is negative, or is below the minimum. A missing key takes
    /// the form default and fractional seconds are truncated.
    pub fn step_init(&self, user_input: Option<&Value>) -> Result<FlowResult> {
        let Some(input) = user_input else {
            return Ok(FlowResult::Form {
                step_id: STEP_INIT.to_string(),
                schema: self.schema(),
            });
        };

        let update_interval = match input.get("update_interval") {
            Some(value) => coerce_interval(value)?,
            None => self.default_interval(),
        };
        let options = EntryOptions::new(update_interval);
        options.validate()?;

        Ok(FlowResult::CreateEntry {
            title: String::new(),
            data: options,
        })
    }

    fn default_interval(&self) -> u64 {
        self.current
            .map(|o| o.update_interval)
            .unwrap_or(DEFAULT_UPDATE_INTERVAL_SECS)
    }

    fn schema(&self) -> Value {
        json!({
            "update_interval": {
                "type": "integer",
                "default": self.default_interval(),
                "min": MIN_UPDATE_INTERVAL_SECS,
                "required": false
            }
        })
    }
}

fn coerce_interval(value: &Value) -> Result<u64> {
    let invalid = || Error::invalid_input("update_interval must be a number of seconds");

    match value {
        Value::Number(n) => match (n.as_u64(), n.as_f64()) {
            (Some(secs), _) => Ok(secs),
            (None, Some(secs)) if secs.is_finite() && secs >= 0.0 => Ok(secs.trunc() as u64),
            _ => Err(invalid()),
        },
        Value::String(s) => s.trim().parse().map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}
