//! Core data types for the task list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Longest accepted task title, in characters.
pub const MAX_TITLE_LEN: usize = 500;

/// Longest accepted category name, in characters.
pub const MAX_CATEGORY_LEN: usize = 100;

/// Longest accepted tag, in characters.
pub const MAX_TAG_LEN: usize = 50;

/// A unit of work on the list.
///
/// Decoding tolerates absent and `null` fields alike, since records written by older clients
/// were persisted without any schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Server-assigned identifier, also the hash field the task is stored under
    #[serde(default)]
    pub id: String,

    /// Short description of the work
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,

    /// Whether the task is done
    #[serde(default, deserialize_with = "null_as_default")]
    pub completed: bool,

    /// Soft reference to a category name; not checked against the category set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Freeform annotations, order kept, duplicates kept
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,

    /// Last write, as milliseconds since the Unix epoch on the wire
    #[serde(
        default,
        serialize_with = "chrono::serde::ts_milliseconds::serialize",
        deserialize_with = "millis_or_epoch"
    )]
    pub updated_at: DateTime<Utc>,
}

/// Body of a task creation request.
///
/// `id` and `updatedAt` sent by a client are ignored; the server assigns both.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTask {
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub completed: Option<bool>,

    #[serde(default)]
    pub category: Option<String>,

    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// Body of a task update request. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskPatch {
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub completed: Option<bool>,

    /// `None` keeps the stored category, `Some(None)` clears it
    #[serde(default, deserialize_with = "nullable")]
    pub category: Option<Option<String>>,

    /// Replaces the stored tags wholesale
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// Body of a category creation request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Category {
    #[serde(default)]
    pub name: String,
}

/// Decode `null` as the type's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decode epoch milliseconds, with `null` or an out-of-range value as the epoch.
fn millis_or_epoch<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let millis = Option::<i64>::deserialize(deserializer)?;
    Ok(millis.and_then(DateTime::from_timestamp_millis).unwrap_or_default())
}

/// Distinguishes an explicit `null` from an absent field.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Validation errors for task and category input.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    EmptyTitle,
    TitleTooLong,
    InvalidCharacters,
    EmptyCategoryName,
    CategoryTooLong,
    InvalidCategory,
    InvalidTag(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::EmptyTitle => write!(f, "title cannot be empty"),
            ValidationError::TitleTooLong => write!(f, "title exceeds {} characters", MAX_TITLE_LEN),
            ValidationError::InvalidCharacters => write!(f, "title contains control characters"),
            ValidationError::EmptyCategoryName => write!(f, "category name cannot be empty"),
            ValidationError::CategoryTooLong => {
                write!(f, "category exceeds {} characters", MAX_CATEGORY_LEN)
            }
            ValidationError::InvalidCategory => write!(f, "category contains control characters"),
            ValidationError::InvalidTag(tag) => {
                write!(
                    f,
                    "invalid tag '{}': must be 1-{} characters without control characters",
                    tag.escape_debug(),
                    MAX_TAG_LEN
                )
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Treat blank category strings as "no category".
pub fn normalize_category(category: Option<String>) -> Option<String> {
    category.filter(|c| !c.trim().is_empty())
}

pub fn validate_title(title: &str) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ValidationError::TitleTooLong);
    }
    if title.chars().any(|c| c.is_control()) {
        return Err(ValidationError::InvalidCharacters);
    }
    Ok(())
}

pub fn validate_category(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyCategoryName);
    }
    if name.chars().count() > MAX_CATEGORY_LEN {
        return Err(ValidationError::CategoryTooLong);
    }
    if name.chars().any(|c| c.is_control()) {
        return Err(ValidationError::InvalidCategory);
    }
    Ok(())
}

pub fn validate_tags(tags: &[String]) -> Result<(), ValidationError> {
    for tag in tags {
        if tag.is_empty() || tag.chars().count() > MAX_TAG_LEN || tag.chars().any(|c| c.is_control()) {
            return Err(ValidationError::InvalidTag(tag.clone()));
        }
    }
    Ok(())
}

impl Task {
    /// Validate the task's client-controlled fields.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_title(&self.title)?;
        if let Some(category) = &self.category {
            validate_category(category)?;
        }
        validate_tags(&self.tags)
    }

    /// The category this task contributes to the category set, if any.
    pub fn category_name(&self) -> Option<&str> {
        self.category.as_deref().filter(|c| !c.trim().is_empty())
    }
}

impl TaskPatch {
    /// Validate only the fields present in the patch.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(Some(category)) = &self.category
            && !category.trim().is_empty()
        {
            validate_category(category)?;
        }
        if let Some(tags) = &self.tags {
            validate_tags(tags)?;
        }
        Ok(())
    }

    /// Returns true if the patch carries no fields at all.
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.completed.is_none() && self.category.is_none() && self.tags.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_task(title: &str) -> Task {
        Task {
            id: "t-0123456789ab".to_string(),
            title: title.to_string(),
            completed: false,
            category: None,
            tags: vec![],
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_task_validation_valid() {
        let task = make_task("Buy milk");
        assert!(task.validate().is_ok());
    }

    #[test]
    fn test_task_validation_empty_title() {
        assert_eq!(make_task("").validate(), Err(ValidationError::EmptyTitle));
        assert_eq!(make_task("   ").validate(), Err(ValidationError::EmptyTitle));
    }

    #[test]
    fn test_task_validation_title_too_long() {
        let task = make_task(&"x".repeat(501));
        assert_eq!(task.validate(), Err(ValidationError::TitleTooLong));
    }

    #[test]
    fn test_task_validation_control_chars() {
        let task = make_task("Title\x00with null");
        assert_eq!(task.validate(), Err(ValidationError::InvalidCharacters));
    }

    #[test]
    fn test_task_validation_invalid_tag() {
        let mut task = make_task("Valid title");
        task.tags = vec!["home".to_string(), String::new()];
        assert_eq!(task.validate(), Err(ValidationError::InvalidTag(String::new())));
    }

    #[test]
    fn test_task_wire_format() {
        let mut task = make_task("Buy milk");
        task.updated_at = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        let json = serde_json::to_value(&task).unwrap();

        assert_eq!(json["updatedAt"], 1_700_000_000_123i64);
        assert_eq!(json["tags"], serde_json::json!([]));
        assert!(json.get("category").is_none());
        assert!(json.get("updated_at").is_none());
    }

    #[test]
    fn test_task_decodes_schemaless_record() {
        let task: Task = serde_json::from_str(r#"{"title":"legacy","updatedAt":1700000000000}"#).unwrap();
        assert_eq!(task.title, "legacy");
        assert!(!task.completed);
        assert!(task.tags.is_empty());
        assert_eq!(task.category, None);
        assert_eq!(task.id, "");
    }

    #[test]
    fn test_task_decodes_null_fields() {
        let task: Task = serde_json::from_str(
            r#"{"title":null,"completed":null,"category":null,"tags":null,"updatedAt":null}"#,
        )
        .unwrap();
        assert_eq!(task.title, "");
        assert!(!task.completed);
        assert_eq!(task.category, None);
        assert!(task.tags.is_empty());
        assert_eq!(task.updated_at.timestamp_millis(), 0);
    }

    #[test]
    fn test_new_task_null_completed() {
        let new: NewTask = serde_json::from_str(r#"{"title":"Buy milk","completed":null}"#).unwrap();
        assert_eq!(new.completed, None);
    }

    #[test]
    fn test_task_category_name_ignores_blank() {
        let mut task = make_task("Buy milk");
        task.category = Some("  ".to_string());
        assert_eq!(task.category_name(), None);
        task.category = Some("work".to_string());
        assert_eq!(task.category_name(), Some("work"));
    }

    #[test]
    fn test_patch_distinguishes_null_from_absent() {
        let absent: TaskPatch = serde_json::from_str(r#"{"completed":true}"#).unwrap();
        assert_eq!(absent.category, None);
        assert_eq!(absent.completed, Some(true));

        let cleared: TaskPatch = serde_json::from_str(r#"{"category":null}"#).unwrap();
        assert_eq!(cleared.category, Some(None));

        let set: TaskPatch = serde_json::from_str(r#"{"category":"work"}"#).unwrap();
        assert_eq!(set.category, Some(Some("work".to_string())));
    }

    #[test]
    fn test_patch_validation_only_checks_present_fields() {
        let patch = TaskPatch {
            completed: Some(true),
            ..Default::default()
        };
        assert!(patch.validate().is_ok());

        let patch = TaskPatch {
            title: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(patch.validate(), Err(ValidationError::EmptyTitle));
    }

    #[test]
    fn test_new_task_ignores_client_id() {
        let new: NewTask =
            serde_json::from_str(r#"{"id":"mine","title":"Buy milk","completed":false,"updatedAt":5}"#).unwrap();
        assert_eq!(new.title.as_deref(), Some("Buy milk"));
        assert_eq!(new.completed, Some(false));
        assert_eq!(new.tags, None);
    }

    #[test]
    fn test_validate_category() {
        assert!(validate_category("work").is_ok());
        assert_eq!(validate_category(""), Err(ValidationError::EmptyCategoryName));
        assert_eq!(
            validate_category(&"c".repeat(101)),
            Err(ValidationError::CategoryTooLong)
        );
        assert_eq!(validate_category("a\tb"), Err(ValidationError::InvalidCategory));
    }

    #[test]
    fn test_normalize_category() {
        assert_eq!(normalize_category(Some(String::new())), None);
        assert_eq!(normalize_category(None), None);
        assert_eq!(normalize_category(Some("work".into())), Some("work".to_string()));
    }
}
