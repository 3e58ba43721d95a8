use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Input structure for creating a task on behalf of a user.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct TaskInput {
    /// What the task is about. Must be between 1 and 1000 characters.
    #[validate(length(min = 1, max = 1000))]
    pub description: String,

    /// Whether the task is already done. Defaults to `false`.
    #[serde(default)]
    pub completed: bool,
}

/// A task record. Tasks belong to the user whose id is in `creator_id`;
/// the user record holds no reference back.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: Uuid,
    pub description: String,
    pub completed: bool,
    /// Identifier of the user who owns/created the task.
    pub creator_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Creates a new `Task` owned by `creator_id` with a fresh id and timestamps.
    pub fn new(input: TaskInput, creator_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            description: input.description.trim().to_string(),
            completed: input.completed,
            creator_id,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_creation() {
        let owner = Uuid::new_v4();
        let input = TaskInput {
            description: "  Write the report ".to_string(),
            completed: false,
        };

        let task = Task::new(input, owner);
        assert_eq!(task.description, "Write the report");
        assert_eq!(task.creator_id, owner);
        assert!(!task.completed);
    }

    #[test]
    fn test_task_validation() {
        let valid_input = TaskInput {
            description: "Valid Task".to_string(),
            completed: true,
        };
        assert!(valid_input.validate().is_ok());

        let invalid_input = TaskInput {
            description: "".to_string(),
            completed: false,
        };
        assert!(invalid_input.validate().is_err());
    }
}
