use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::folder::FolderId;
use crate::domain::prompt::template::PromptTemplate;
use crate::domain::slug::validate_slug;
use crate::domain::storage::{StorageEntity, StorageKey};
use crate::domain::user::UserId;

pub const MAX_NAME_LENGTH: usize = 200;

/// Identifier for a prompt. Lowercase slug, stable across versions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PromptId(String);

impl PromptId {
    pub fn new(id: impl Into<String>) -> DomainResult<Self> {
        let id = id.into();
        validate_slug("prompt", &id)?;
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PromptId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PromptId> for String {
    fn from(id: PromptId) -> Self {
        id.0
    }
}

impl std::fmt::Display for PromptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl StorageKey for PromptId {
    fn as_str(&self) -> &str {
        &self.0
    }
}

/// Who can see a prompt besides its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Private,
    /// Visible to every authenticated user.
    Public,
    /// Visible to users the containing folder has been shared with.
    Shared,
}

/// Type of a declared prompt variable. Values are always supplied as
/// strings and checked against the declared type before rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VariableType {
    Text,
    Number,
    Boolean,
    Select { options: Vec<String> },
}

impl VariableType {
    fn check(&self, name: &str, raw: &str) -> DomainResult<()> {
        match self {
            VariableType::Text => Ok(()),
            VariableType::Number => {
                raw.parse::<f64>().map(|_| ()).map_err(|_| {
                    DomainError::validation(format!(
                        "variable '{name}' expects a number, got '{raw}'"
                    ))
                })
            }
            VariableType::Boolean => match raw {
                "true" | "false" => Ok(()),
                _ => Err(DomainError::validation(format!(
                    "variable '{name}' expects 'true' or 'false', got '{raw}'"
                ))),
            },
            VariableType::Select { options } => {
                if options.iter().any(|o| o == raw) {
                    Ok(())
                } else {
                    Err(DomainError::validation(format!(
                        "variable '{name}' expects one of [{}], got '{raw}'",
                        options.join(", ")
                    )))
                }
            }
        }
    }
}

/// A typed variable declared on a prompt, bound to a `{{name}}` token
/// in the prompt body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    #[serde(flatten)]
    pub var_type: VariableType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Variable {
    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            var_type: VariableType::Text,
            required: false,
            default_value: None,
            description: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.name.is_empty()
            || !self
                .name
                .chars()
                .enumerate()
                .all(|(i, c)| c == '_' || c.is_ascii_alphabetic() || (i > 0 && c.is_ascii_digit()))
        {
            return Err(DomainError::validation(format!(
                "variable name '{}' must be an identifier",
                self.name
            )));
        }
        if let VariableType::Select { options } = &self.var_type {
            if options.is_empty() {
                return Err(DomainError::validation(format!(
                    "select variable '{}' needs at least one option",
                    self.name
                )));
            }
        }
        if let Some(default) = &self.default_value {
            self.var_type.check(&self.name, default)?;
        }
        Ok(())
    }

    pub fn check_value(&self, raw: &str) -> DomainResult<()> {
        self.var_type.check(&self.name, raw)
    }
}

fn default_revision() -> u32 {
    1
}

/// A prompt: a named template with typed variables, owned by a user and
/// optionally filed under a folder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    id: PromptId,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    content: String,
    #[serde(default)]
    variables: Vec<Variable>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    folder_id: Option<FolderId>,
    #[serde(default)]
    visibility: Visibility,
    owner: UserId,
    /// Semantic version of the most recent committed snapshot.
    version: String,
    /// Working-copy counter, bumped whenever the content template changes.
    #[serde(default = "default_revision")]
    revision: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Prompt {
    pub fn new(
        id: PromptId,
        name: impl Into<String>,
        content: impl Into<String>,
        owner: UserId,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("prompt name cannot be empty"));
        }
        if name.len() > MAX_NAME_LENGTH {
            return Err(DomainError::validation(format!(
                "prompt name cannot exceed {MAX_NAME_LENGTH} characters"
            )));
        }
        let content = content.into();
        if content.trim().is_empty() {
            return Err(DomainError::validation("prompt content cannot be empty"));
        }
        let now = Utc::now();
        Ok(Self {
            id,
            name,
            description: None,
            content,
            variables: Vec::new(),
            folder_id: None,
            visibility: Visibility::default(),
            owner,
            version: "1.0.0".to_string(),
            revision: 1,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_variables(mut self, variables: Vec<Variable>) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_folder(mut self, folder_id: FolderId) -> Self {
        self.folder_id = Some(folder_id);
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn id(&self) -> &PromptId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn folder_id(&self) -> Option<&FolderId> {
        self.folder_id.as_ref()
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn owner(&self) -> &UserId {
        &self.owner
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn revision(&self) -> u32 {
        self.revision
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.touch();
    }

    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description;
        self.touch();
    }

    pub fn set_content(&mut self, content: impl Into<String>) {
        let content = content.into();
        if content != self.content {
            self.revision += 1;
        }
        self.content = content;
        self.touch();
    }

    pub fn set_variables(&mut self, variables: Vec<Variable>) {
        self.variables = variables;
        self.touch();
    }

    pub fn set_folder(&mut self, folder_id: Option<FolderId>) {
        self.folder_id = folder_id;
        self.touch();
    }

    pub fn set_visibility(&mut self, visibility: Visibility) {
        self.visibility = visibility;
        self.touch();
    }

    pub fn set_version(&mut self, version: impl Into<String>) {
        self.version = version.into();
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Checks the whole prompt is consistent: variables are well formed,
    /// names are unique, and every `{{token}}` in the body is declared.
    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("prompt name cannot be empty"));
        }
        if self.content.trim().is_empty() {
            return Err(DomainError::validation("prompt content cannot be empty"));
        }
        let mut seen = Vec::new();
        for variable in &self.variables {
            variable.validate()?;
            if seen.contains(&&variable.name) {
                return Err(DomainError::validation(format!(
                    "duplicate variable '{}'",
                    variable.name
                )));
            }
            seen.push(&variable.name);
        }
        let template = PromptTemplate::parse(&self.content);
        for token in template.tokens() {
            if !self.variables.iter().any(|v| &v.name == token) {
                return Err(DomainError::validation(format!(
                    "content references undeclared variable '{token}'"
                )));
            }
        }
        Ok(())
    }

    /// Renders the prompt body. Supplied values are type-checked against
    /// the declared variables, declared defaults fill the gaps, and a
    /// missing required variable is an error.
    pub fn render(&self, supplied: &HashMap<String, String>) -> DomainResult<String> {
        let mut values: HashMap<String, String> = HashMap::new();
        for variable in &self.variables {
            match supplied.get(&variable.name) {
                Some(raw) => {
                    variable.check_value(raw)?;
                    values.insert(variable.name.clone(), raw.clone());
                }
                None => {
                    if let Some(default) = &variable.default_value {
                        values.insert(variable.name.clone(), default.clone());
                    } else if variable.required {
                        return Err(DomainError::validation(format!(
                            "required variable '{}' not supplied",
                            variable.name
                        )));
                    } else {
                        // Optional with no default renders as nothing.
                        values.insert(variable.name.clone(), String::new());
                    }
                }
            }
        }
        for name in supplied.keys() {
            if !self.variables.iter().any(|v| &v.name == name) {
                return Err(DomainError::validation(format!(
                    "unknown variable '{name}'"
                )));
            }
        }
        PromptTemplate::parse(&self.content).render(&values)
    }
}

impl StorageEntity for Prompt {
    type Key = PromptId;
    const COLLECTION: &'static str = "prompts";

    fn storage_key(&self) -> PromptId {
        self.id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> UserId {
        UserId::new("alice").unwrap()
    }

    fn sample() -> Prompt {
        Prompt::new(
            PromptId::new("greeting").unwrap(),
            "Greeting",
            "Hello {{name}}, the weather is {{weather}}.",
            owner(),
        )
        .unwrap()
        .with_variables(vec![
            Variable::text("name").required(),
            Variable {
                name: "weather".to_string(),
                var_type: VariableType::Select {
                    options: vec!["sunny".to_string(), "rainy".to_string()],
                },
                required: false,
                default_value: Some("sunny".to_string()),
                description: None,
            },
        ])
    }

    #[test]
    fn test_prompt_id_rejects_bad_slugs() {
        assert!(PromptId::new("Has Space").is_err());
        assert!(PromptId::new("greeting").is_ok());
    }

    #[test]
    fn test_new_rejects_empty_fields() {
        let id = PromptId::new("p").unwrap();
        assert!(Prompt::new(id.clone(), "  ", "body", owner()).is_err());
        assert!(Prompt::new(id, "name", "", owner()).is_err());
    }

    #[test]
    fn test_validate_catches_undeclared_token() {
        let prompt = Prompt::new(
            PromptId::new("p").unwrap(),
            "P",
            "Hi {{who}}",
            owner(),
        )
        .unwrap();
        let err = prompt.validate().unwrap_err();
        assert!(err.to_string().contains("who"));
    }

    #[test]
    fn test_validate_catches_duplicate_variables() {
        let prompt = Prompt::new(PromptId::new("p").unwrap(), "P", "x", owner())
            .unwrap()
            .with_variables(vec![Variable::text("a"), Variable::text("a")]);
        assert!(prompt.validate().is_err());
    }

    #[test]
    fn test_content_change_bumps_revision() {
        let mut prompt = sample();
        assert_eq!(prompt.revision(), 1);
        prompt.set_content("Hi {{name}}, the weather is {{weather}}.");
        assert_eq!(prompt.revision(), 2);
        prompt.set_name("Renamed");
        assert_eq!(prompt.revision(), 2);
    }

    #[test]
    fn test_render_applies_defaults() {
        let prompt = sample();
        let mut supplied = HashMap::new();
        supplied.insert("name".to_string(), "Ada".to_string());
        let rendered = prompt.render(&supplied).unwrap();
        assert_eq!(rendered, "Hello Ada, the weather is sunny.");
    }

    #[test]
    fn test_render_omitted_optional_renders_empty() {
        let prompt = Prompt::new(
            PromptId::new("memo").unwrap(),
            "Memo",
            "To {{who}}:{{note}}",
            owner(),
        )
        .unwrap()
        .with_variables(vec![Variable::text("who").required(), Variable::text("note")]);
        let mut supplied = HashMap::new();
        supplied.insert("who".to_string(), "Ada".to_string());
        assert_eq!(prompt.render(&supplied).unwrap(), "To Ada:");
    }

    #[test]
    fn test_render_missing_required_fails() {
        let prompt = sample();
        let err = prompt.render(&HashMap::new()).unwrap_err();
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn test_render_checks_select_options() {
        let prompt = sample();
        let mut supplied = HashMap::new();
        supplied.insert("name".to_string(), "Ada".to_string());
        supplied.insert("weather".to_string(), "foggy".to_string());
        assert!(prompt.render(&supplied).is_err());
    }

    #[test]
    fn test_render_rejects_unknown_variable() {
        let prompt = sample();
        let mut supplied = HashMap::new();
        supplied.insert("name".to_string(), "Ada".to_string());
        supplied.insert("mystery".to_string(), "x".to_string());
        assert!(prompt.render(&supplied).is_err());
    }

    #[test]
    fn test_number_and_boolean_checks() {
        let number = Variable {
            name: "count".to_string(),
            var_type: VariableType::Number,
            required: true,
            default_value: None,
            description: None,
        };
        assert!(number.check_value("3.5").is_ok());
        assert!(number.check_value("three").is_err());

        let flag = Variable {
            name: "verbose".to_string(),
            var_type: VariableType::Boolean,
            required: false,
            default_value: None,
            description: None,
        };
        assert!(flag.check_value("true").is_ok());
        assert!(flag.check_value("yes").is_err());
    }

    #[test]
    fn test_default_value_must_match_type() {
        let bad = Variable {
            name: "count".to_string(),
            var_type: VariableType::Number,
            required: false,
            default_value: Some("lots".to_string()),
            description: None,
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_serde_round_trip_preserves_variables() {
        let prompt = sample();
        let json = serde_json::to_string(&prompt).unwrap();
        let back: Prompt = serde_json::from_str(&json).unwrap();
        assert_eq!(back.variables(), prompt.variables());
        assert_eq!(back.id(), prompt.id());
    }
}
