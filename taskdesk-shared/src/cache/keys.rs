//! Cache key builders

use crate::models::TaskStatus;

pub fn task_key(task_id: i64) -> String {
    format!("task:{task_id}")
}

pub fn user_key(user_id: i64) -> String {
    format!("user:{user_id}")
}

pub fn user_tasks_key(user_id: i64) -> String {
    format!("user_tasks:{user_id}")
}

pub fn task_count_key(user_id: i64, status: TaskStatus) -> String {
    format!("task_count:{user_id}:{}", status.as_str())
}
