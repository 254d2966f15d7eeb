//! Serialisable step scripts.
//!
//! A script is an ordered list of steps, each tagged by its `action`:
//!
//! ```json
//! {"steps": [
//!   {"action": "click", "template": "flag1.png", "wait": 19},
//!   {"action": "click", "template": "upboat.png", "button": "right", "wait": 5},
//!   {"action": "alt_click", "template": "npc.png"},
//!   {"action": "dialogue", "text": "spiritual"}
//! ]}
//! ```

use serde::{Deserialize, Serialize};

use crate::command::{ClickKind, Command};
use crate::error::ApiError;
use crate::locator::Template;

fn default_confirmation() -> String {
    "yes".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Find a template, move onto it and click.
    Click {
        template: Template,
        #[serde(default)]
        button: ClickKind,
        /// Seconds to wait after the click.
        #[serde(default)]
        wait: f64,
    },
    AltClick {
        template: Template,
    },
    MoveTo {
        x: i32,
        y: i32,
    },
    Key {
        name: String,
        #[serde(default)]
        after: f64,
    },
    Type {
        text: String,
        #[serde(default)]
        after: f64,
    },
    /// Answer an NPC-style dialogue: greet, say `text`, confirm, close.
    Dialogue {
        text: String,
        #[serde(default = "default_confirmation")]
        confirmation: String,
    },
    Pause {
        seconds: f64,
    },
}

impl Step {
    /// The `action` tag of this step.
    pub fn action(&self) -> &'static str {
        match self {
            Step::Click { .. } => "click",
            Step::AltClick { .. } => "alt_click",
            Step::MoveTo { .. } => "move_to",
            Step::Key { .. } => "key",
            Step::Type { .. } => "type",
            Step::Dialogue { .. } => "dialogue",
            Step::Pause { .. } => "pause",
        }
    }

    /// Check arguments without touching any device.
    pub fn validate(&self) -> Result<(), ApiError> {
        match self {
            Step::Click { template, wait, .. } => {
                check_template(template)?;
                check_seconds("wait", *wait)
            }
            Step::AltClick { template } => check_template(template),
            Step::MoveTo { .. } => Ok(()),
            Step::Key { name, after } => {
                Command::key(name)?;
                check_seconds("after", *after)
            }
            Step::Type { text, after } => {
                Command::text(text)?;
                check_seconds("after", *after)
            }
            Step::Dialogue { text, confirmation } => {
                Command::text(text)?;
                Command::text(confirmation).map(|_| ())
            }
            Step::Pause { seconds } => check_seconds("seconds", *seconds),
        }
    }
}

fn check_template(template: &Template) -> Result<(), ApiError> {
    if template.path().as_os_str().is_empty() {
        return Err(ApiError::invalid_input("Template path cannot be empty"));
    }
    Ok(())
}

fn check_seconds(field: &str, value: f64) -> Result<(), ApiError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ApiError::invalid_input_with_suggestion(
            format!("'{}' must be a non-negative number of seconds, got {}", field, value),
            "Use a value such as 0.5 or 10",
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Script {
    pub steps: Vec<Step>,
}

impl Script {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    pub fn from_json(json: &str) -> Result<Self, ApiError> {
        let script: Script = serde_json::from_str(json).map_err(|e| {
            ApiError::invalid_input_with_suggestion(
                format!("Invalid script: {}", e),
                "Run 'pointpilot examples' to see the script format",
            )
        })?;
        script.validate()?;
        Ok(script)
    }

    /// Validate every step, naming the first bad one.
    pub fn validate(&self) -> Result<(), ApiError> {
        for (index, step) in self.steps.iter().enumerate() {
            step.validate().map_err(|e| ApiError {
                message: format!("Step {} ({}): {}", index + 1, step.action(), e.message),
                ..e
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_parse_full_script() {
        let json = r#"{"steps": [
            {"action": "click", "template": "flag1.png", "wait": 19},
            {"action": "click", "template": "upboat.png", "button": "right", "wait": 5},
            {"action": "alt_click", "template": "npc.png"},
            {"action": "move_to", "x": 640, "y": -20},
            {"action": "key", "name": "esc", "after": 0.5},
            {"action": "type", "text": "hi"},
            {"action": "dialogue", "text": "spiritual"},
            {"action": "pause", "seconds": 2.5}
        ]}"#;

        let script = Script::from_json(json).unwrap();
        assert_eq!(script.steps.len(), 8);
        assert_eq!(
            script.steps[0],
            Step::Click {
                template: Template::new("flag1.png"),
                button: ClickKind::Left,
                wait: 19.0,
            }
        );
        assert!(matches!(
            script.steps[1],
            Step::Click { button: ClickKind::Right, .. }
        ));
        assert_eq!(script.steps[3], Step::MoveTo { x: 640, y: -20 });
        assert_eq!(
            script.steps[5],
            Step::Type { text: "hi".to_string(), after: 0.0 }
        );
        assert_eq!(
            script.steps[6],
            Step::Dialogue {
                text: "spiritual".to_string(),
                confirmation: "yes".to_string(),
            }
        );
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let err = Script::from_json(r#"{"steps": [{"action": "jump"}]}"#).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);
        assert!(err.suggestion.unwrap().contains("examples"));
    }

    #[test]
    fn test_validation_names_the_step() {
        let json = r#"{"steps": [
            {"action": "pause", "seconds": 1},
            {"action": "key", "name": "hyper"}
        ]}"#;
        let err = Script::from_json(json).unwrap_err();
        assert!(err.message.starts_with("Step 2 (key)"), "got {}", err.message);
    }

    #[test]
    fn test_validation_rejects_negative_wait_and_bad_text() {
        let step = Step::Click {
            template: Template::new("a.png"),
            button: ClickKind::Left,
            wait: -1.0,
        };
        assert!(step.validate().is_err());

        let step = Step::Dialogue {
            text: "one\ntwo".to_string(),
            confirmation: "yes".to_string(),
        };
        assert!(step.validate().is_err());

        let step = Step::AltClick { template: Template::new("") };
        assert!(step.validate().is_err());
    }

    #[test]
    fn test_serialises_with_action_tag() {
        let value = serde_json::to_value(Step::AltClick {
            template: Template::new("npc.png"),
        })
        .unwrap();
        assert_eq!(value["action"], "alt_click");
        assert_eq!(value["template"], "npc.png");
    }
}
