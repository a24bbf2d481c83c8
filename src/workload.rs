//! Demo workload: a declaratively configured form with field validation
//!
//! This is the instrumented subject used by the `renderscope` binary. Each
//! [`FormState::render`] is profiled as exactly one render of the observed
//! key. Controls whose value did not change since their last render reuse
//! their cached markup; the cost of their last full render is credited to the
//! event's base duration, so the ratio shows what memoization saved.

use crate::emitter::{RenderObserver, RenderProfiler};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;
use thiserror::Error;

/// Message used when a failing control has no message of its own
pub const DEFAULT_CONTROL_ERROR: &str = "Invalid control";
/// Form-level message when submission finds invalid controls
pub const FORM_INVALID_ERROR: &str = "Please fix the errors in the form";

/// Kind of input a control renders as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlKind {
    Text,
    Email,
    Password,
    Number,
    Select,
    Checkbox,
    Radio,
    Textarea,
}

/// Value held by a control
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Bool(bool),
}

impl FieldValue {
    /// Empty text, zero and `false` count as "no value" for required checks
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Text(s) => s.is_empty(),
            FieldValue::Number(n) => *n == 0.0 || n.is_nan(),
            FieldValue::Bool(b) => !b,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => write!(f, "{}", s),
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

/// Pattern a non-blank value must match
#[derive(Debug, Clone)]
pub struct Validation {
    pub pattern: Regex,
    pub message: Option<String>,
}

/// One declaratively configured form control
#[derive(Debug, Clone)]
pub struct FormControl {
    pub name: String,
    pub kind: ControlKind,
    pub label: String,
    pub value: FieldValue,
    pub options: Vec<(String, String)>,
    pub required: bool,
    pub validation: Option<Validation>,
    pub error: Option<String>,
}

impl FormControl {
    pub fn new(name: &str, kind: ControlKind, label: &str, value: impl Into<FieldValue>) -> Self {
        FormControl {
            name: name.to_string(),
            kind,
            label: label.to_string(),
            value: value.into(),
            options: Vec::new(),
            required: false,
            validation: None,
            error: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_options(mut self, options: &[(&str, &str)]) -> Self {
        self.options = options
            .iter()
            .map(|(label, value)| (label.to_string(), value.to_string()))
            .collect();
        self
    }

    pub fn with_pattern(mut self, pattern: &str, message: &str) -> Result<Self, regex::Error> {
        self.validation = Some(Validation {
            pattern: Regex::new(pattern)?,
            message: Some(message.to_string()),
        });
        Ok(self)
    }

    /// Whether `value` satisfies this control's rules
    pub fn accepts(&self, value: &FieldValue) -> bool {
        if self.required && value.is_blank() {
            return false;
        }
        match &self.validation {
            Some(validation) if !value.is_blank() => {
                validation.pattern.is_match(&value.to_string())
            }
            _ => true,
        }
    }

    fn error_message(&self) -> String {
        self.validation
            .as_ref()
            .and_then(|v| v.message.clone())
            .unwrap_or_else(|| DEFAULT_CONTROL_ERROR.to_string())
    }

    fn validate_value(&mut self, value: &FieldValue) {
        self.error = if self.accepts(value) {
            None
        } else {
            Some(self.error_message())
        };
    }

    fn render_markup(&self) -> String {
        let marker = if self.required { "*" } else { "" };
        let input = match self.kind {
            ControlKind::Checkbox | ControlKind::Radio => {
                let checked = if self.value.is_blank() { " " } else { "x" };
                format!("[{}]", checked)
            }
            ControlKind::Password => format!("[{}]", "*".repeat(self.value.to_string().len())),
            ControlKind::Select => {
                let selected = self.value.to_string();
                let label = self
                    .options
                    .iter()
                    .find(|(_, value)| *value == selected)
                    .map(|(label, _)| label.as_str())
                    .unwrap_or("-");
                format!("<{}>", label)
            }
            _ => format!("[{}]", self.value),
        };
        let mut out = format!("{}{}: {}", self.label, marker, input);
        if let Some(error) = &self.error {
            out.push_str(&format!("  ! {}", error));
        }
        out
    }
}

/// Submission failures
#[derive(Debug, Error, PartialEq)]
pub enum FormError {
    #[error("{}", FORM_INVALID_ERROR)]
    Invalid,
    #[error("{0}")]
    Rejected(String),
}

/// Form data handed to the submit handler, keyed by control name
pub type FormData = BTreeMap<String, FieldValue>;

/// State of a rendered form
#[derive(Debug, Clone)]
pub struct FormState {
    controls: Vec<FormControl>,
    form_error: Option<String>,
    /// Cached markup and its render cost (ms) per control; `None` means the
    /// control must re-render
    cache: Vec<Option<(String, f64)>>,
}

impl FormState {
    pub fn new(controls: Vec<FormControl>) -> Self {
        let cache = vec![None; controls.len()];
        FormState {
            controls,
            form_error: None,
            cache,
        }
    }

    pub fn controls(&self) -> &[FormControl] {
        &self.controls
    }

    pub fn control(&self, name: &str) -> Option<&FormControl> {
        self.controls.iter().find(|c| c.name == name)
    }

    pub fn form_error(&self) -> Option<&str> {
        self.form_error.as_deref()
    }

    /// Set one control's value and validate just that control
    ///
    /// Unknown names are ignored.
    pub fn handle_change(&mut self, name: &str, value: impl Into<FieldValue>) {
        let value = value.into();
        if let Some(idx) = self.controls.iter().position(|c| c.name == name) {
            let control = &mut self.controls[idx];
            control.validate_value(&value);
            control.value = value;
            self.cache[idx] = None;
        }
    }

    /// Validate every control and hand the data to `on_submit`
    pub fn submit<F>(&mut self, on_submit: F) -> Result<FormData, FormError>
    where
        F: FnOnce(&FormData) -> Result<(), String>,
    {
        for (idx, control) in self.controls.iter_mut().enumerate() {
            let value = control.value.clone();
            let before = control.error.clone();
            control.validate_value(&value);
            if control.error != before {
                self.cache[idx] = None;
            }
        }

        if self.controls.iter().any(|c| c.error.is_some()) {
            self.form_error = Some(FORM_INVALID_ERROR.to_string());
            return Err(FormError::Invalid);
        }

        self.form_error = None;
        let data: FormData = self
            .controls
            .iter()
            .map(|c| (c.name.clone(), c.value.clone()))
            .collect();

        match on_submit(&data) {
            Ok(()) => Ok(data),
            Err(message) => {
                self.form_error = Some(message.clone());
                Err(FormError::Rejected(message))
            }
        }
    }

    /// Render the form as one profiled render of `key`
    pub fn render<O: RenderObserver>(&mut self, profiler: &RenderProfiler<O>, key: &str) -> String {
        let controls = &self.controls;
        let cache = &mut self.cache;
        let form_error = &self.form_error;

        profiler.profile(key, |ctx| {
            let mut lines = Vec::with_capacity(controls.len() + 1);
            for (control, cached) in controls.iter().zip(cache.iter_mut()) {
                let line = if let Some((markup, cost_ms)) = cached.as_ref() {
                    ctx.credit_reused(*cost_ms);
                    markup.clone()
                } else {
                    let start = Instant::now();
                    let markup = control.render_markup();
                    let cost_ms = start.elapsed().as_secs_f64() * 1000.0;
                    *cached = Some((markup.clone(), cost_ms));
                    markup
                };
                lines.push(line);
            }
            if let Some(error) = form_error {
                lines.push(format!("!! {}", error));
            }
            lines.join("\n")
        })
    }
}

/// Sign-up form used by the demo binary
pub fn demo_form() -> Result<FormState, regex::Error> {
    Ok(FormState::new(vec![
        FormControl::new("email", ControlKind::Email, "Email", "")
            .required()
            .with_pattern(r"^[^\s@]+@[^\s@]+\.[^\s@]+$", "Invalid email format")?,
        FormControl::new("age", ControlKind::Number, "Age", "")
            .with_pattern(r"^[1-9]\d*$", "Age must be a positive number")?,
        FormControl::new("country", ControlKind::Select, "Country", "es").with_options(&[
            ("Spain", "es"),
            ("Mexico", "mx"),
            ("Argentina", "ar"),
        ]),
        FormControl::new("newsletter", ControlKind::Checkbox, "Newsletter", false),
    ]))
}

/// Scripted edits for the demo form: typing an email, then the other fields
pub fn demo_edits() -> Vec<(&'static str, FieldValue)> {
    let email = "ana@example.com";
    let mut edits: Vec<(&'static str, FieldValue)> = (1..=email.len())
        .map(|n| ("email", FieldValue::from(&email[..n])))
        .collect();
    edits.push(("age", FieldValue::from(34.0)));
    edits.push(("country", FieldValue::from("mx")));
    edits.push(("newsletter", FieldValue::from(true)));
    edits
}
