//! Recursive command option trees.
//!
//! Options are ordered and may nest: subcommand groups contain subcommands,
//! subcommands contain leaf options, and leaf options may carry a fixed
//! choice list. The same shape is used for locally declared commands and
//! for commands fetched back from the remote catalog, so the synchronizer
//! can compare the two directly.

use serde::{Deserialize, Serialize};

/// Kind of a command option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionKind {
    SubCommand,
    SubCommandGroup,
    String,
    Integer,
    Number,
    Boolean,
    User,
    Channel,
    Role,
    Attachment,
}

impl OptionKind {
    /// Kinds that may carry nested child options.
    #[must_use]
    pub fn is_nesting(self) -> bool {
        matches!(self, Self::SubCommand | Self::SubCommandGroup)
    }

    /// Kinds that may carry a fixed choice list.
    #[must_use]
    pub fn supports_choices(self) -> bool {
        matches!(self, Self::String | Self::Integer | Self::Number)
    }
}

/// Value of a predefined choice. Compared by type: a string choice never
/// equals an integer choice even when they print the same.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChoiceValue {
    Str(String),
    Int(i64),
    Number(f64),
}

impl From<&str> for ChoiceValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<i64> for ChoiceValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for ChoiceValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// One predefined choice for a leaf option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionChoice {
    pub name: String,
    pub value: ChoiceValue,
}

/// One node of a command's option tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOption {
    pub kind: OptionKind,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<OptionChoice>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<CommandOption>,
}

impl CommandOption {
    #[must_use]
    pub fn new(kind: OptionKind, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            description: description.into(),
            required: false,
            choices: Vec::new(),
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn choice(mut self, name: impl Into<String>, value: impl Into<ChoiceValue>) -> Self {
        self.choices.push(OptionChoice {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn child(mut self, option: CommandOption) -> Self {
        self.children.push(option);
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn builder_chain_produces_nested_tree() {
        let tree = CommandOption::new(OptionKind::SubCommand, "ban", "Ban a user").child(
            CommandOption::new(OptionKind::User, "target", "Who to ban").required(),
        );
        assert_eq!(tree.children.len(), 1);
        assert!(tree.children[0].required);
        assert_eq!(tree.children[0].kind, OptionKind::User);
    }

    #[test]
    fn serde_omits_empty_collections() {
        let opt = CommandOption::new(OptionKind::Boolean, "silent", "Suppress the reply");
        let json = serde_json::to_value(&opt).unwrap();
        assert!(json.get("choices").is_none());
        assert!(json.get("children").is_none());
        assert_eq!(json["kind"], "boolean");
    }

    #[test]
    fn choice_values_compare_by_type() {
        assert_ne!(ChoiceValue::from("1"), ChoiceValue::from(1_i64));
        assert_ne!(ChoiceValue::from(1_i64), ChoiceValue::from(1.0_f64));
        assert_eq!(ChoiceValue::from("a"), ChoiceValue::from("a"));
    }

    #[test]
    fn remote_shape_parses_with_defaults() {
        let json = serde_json::json!({
            "kind": "string",
            "name": "reason",
            "description": "Why",
            "choices": [{"name": "spam", "value": "spam"}],
        });
        let opt: CommandOption = serde_json::from_value(json).unwrap();
        assert!(!opt.required);
        assert_eq!(opt.choices[0].value, ChoiceValue::from("spam"));
        assert!(opt.children.is_empty());
    }

    #[test]
    fn nesting_kinds() {
        assert!(OptionKind::SubCommand.is_nesting());
        assert!(OptionKind::SubCommandGroup.is_nesting());
        assert!(!OptionKind::String.is_nesting());
        assert!(OptionKind::Integer.supports_choices());
        assert!(!OptionKind::User.supports_choices());
    }
}
