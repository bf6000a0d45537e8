// Starter collections for newly created databases

use super::types::{
    Choices, Collection, Field, FieldKind, RelationConfig, SortDirection, SortKey, View, ViewType,
};
use regex::Regex;
use std::sync::OnceLock;
use uuid::Uuid;

pub const STATUS_OPTIONS: [&str; 3] = ["Not started", "In progress", "Done"];

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn task_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)\btasks?\b").expect("static regex"))
}

/// Whether a collection name asks for the task template.
pub fn is_task_name(name: &str) -> bool {
    task_name_pattern().is_match(name.trim())
}

/// Pick the starter template for a new collection by its name.
pub fn template_for(name: &str) -> Collection {
    if is_task_name(name) {
        task_template(name)
    } else {
        default_template(name)
    }
}

/// Title + Status, with a table view and a kanban grouped by status.
pub fn default_template(name: &str) -> Collection {
    let title_id = new_id();
    let status_id = new_id();

    let mut kanban = View::new(new_id(), "Kanban", ViewType::Kanban);
    kanban.group_by = Some(status_id.clone());

    Collection {
        id: new_id(),
        name: name.to_string(),
        schema: vec![
            Field::new(title_id, "Title", FieldKind::Text),
            Field::new(status_id, "Status", FieldKind::Status(Choices::new(STATUS_OPTIONS))),
        ],
        views: vec![View::new(new_id(), "All Items", ViewType::Table), kanban],
        records: Vec::new(),
    }
}

/// Task tracker layout: status, priority, due date, effort, blocked flag and a project relation.
pub fn task_template(name: &str) -> Collection {
    let title_id = new_id();
    let status_id = new_id();
    let priority_id = new_id();
    let due_id = new_id();
    let effort_id = new_id();
    let blocked_id = new_id();
    let project_id = new_id();

    let mut all = View::new(new_id(), "All Tasks", ViewType::Table);
    all.sort.push(SortKey {
        field_id: due_id.clone(),
        direction: SortDirection::Asc,
    });
    let mut by_status = View::new(new_id(), "By Status", ViewType::Kanban);
    by_status.group_by = Some(status_id.clone());
    let mut calendar = View::new(new_id(), "Calendar", ViewType::Calendar);
    calendar.group_by = Some(due_id.clone());

    Collection {
        id: new_id(),
        name: name.to_string(),
        schema: vec![
            Field::new(title_id, "Title", FieldKind::Text),
            Field::new(status_id, "Status", FieldKind::Status(Choices::new(STATUS_OPTIONS))),
            Field::new(
                priority_id,
                "Priority",
                FieldKind::Select(Choices::new(["Low", "Medium", "High"])),
            ),
            Field::new(due_id, "Due Date", FieldKind::Date),
            Field::new(effort_id, "Effort", FieldKind::Number),
            Field::new(blocked_id, "Blocked", FieldKind::Checkbox),
            Field::new(
                project_id,
                "Project",
                FieldKind::Relation {
                    relation: RelationConfig::default(),
                },
            ),
        ],
        views: vec![all, by_status, calendar],
        records: Vec::new(),
    }
}

/// Copy a collection under fresh collection, view and record ids.
pub fn duplicate_collection(source: &Collection) -> Collection {
    let mut copy = source.clone();
    copy.id = new_id();
    copy.name = format!("{} (Copy)", source.name);
    for record in &mut copy.records {
        record.id = new_id();
    }
    for view in &mut copy.views {
        view.id = new_id();
    }
    copy
}
