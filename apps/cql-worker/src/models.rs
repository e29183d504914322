use cql_lifecycle::{ClusteringOrder, ColumnType, Model, ModelDef, TableSchema, UserTypeSchema};

pub struct Task;

impl Model for Task {
    fn definition() -> ModelDef {
        ModelDef::concrete(
            "Task",
            TableSchema::new("tasks")
                .column("project_id", ColumnType::Uuid)
                .column("id", ColumnType::TimeUuid)
                .column("title", ColumnType::Text)
                .column("status", ColumnType::Text)
                .column("tags", ColumnType::set(ColumnType::frozen(ColumnType::UserType("tag".into()))))
                .column("created_at", ColumnType::Timestamp)
                .partition_key("project_id")
                .clustering_key("id", ClusteringOrder::Desc),
        )
    }
}

/// Groups the event tables; owns no table itself
pub struct Event;

impl Model for Event {
    fn definition() -> ModelDef {
        ModelDef::abstract_model("Event")
    }
}

pub struct TaskEvent;

impl Model for TaskEvent {
    fn definition() -> ModelDef {
        ModelDef::concrete("TaskEvent", event_table("task_events")).extends("Event")
    }
}

pub struct ProjectEvent;

impl Model for ProjectEvent {
    fn definition() -> ModelDef {
        ModelDef::concrete("ProjectEvent", event_table("project_events")).extends("Event")
    }
}

fn event_table(name: &str) -> TableSchema {
    TableSchema::new(name)
        .column("entity_id", ColumnType::Uuid)
        .column("occurred_at", ColumnType::TimeUuid)
        .column("kind", ColumnType::Text)
        .column("payload", ColumnType::map(ColumnType::Text, ColumnType::Text))
        .partition_key("entity_id")
        .clustering_key("occurred_at", ClusteringOrder::Desc)
}

/// User type referenced by `tasks.tags`; must exist before the table
pub fn tag_type() -> UserTypeSchema {
    UserTypeSchema::new("tag")
        .field("name", ColumnType::Text)
        .field("color", ColumnType::Text)
}
