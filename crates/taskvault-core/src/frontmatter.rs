//! Task file codec: a YAML frontmatter block, a blank line, and the
//! markdown body. Unknown frontmatter keys are preserved verbatim so other
//! tools can annotate task files without this layer discarding their data.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use serde_yaml::{Mapping, Value};
use thiserror::Error;

use crate::dates;
use crate::task::{Status, Task};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("missing frontmatter delimiter")]
    MissingFrontmatter,
    #[error("missing closing --- for frontmatter")]
    MissingFrontmatterEnd,
    #[error("frontmatter is not a mapping")]
    NotAMapping,
    #[error("invalid frontmatter: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("invalid value for {field}: {value:?}")]
    InvalidField { field: &'static str, value: String },
}

const KNOWN_KEYS: [&str; 14] = [
    "id",
    "title",
    "status",
    "due",
    "project",
    "assigned_to",
    "waiting_on",
    "blocked_by",
    "blocks",
    "tags",
    "time_estimate",
    "created",
    "updated",
    "completed",
];

pub fn split_front_matter(text: &str) -> Result<(String, String), ParseError> {
    if !text.starts_with("---") {
        return Err(ParseError::MissingFrontmatter);
    }
    let lines: Vec<&str> = text.lines().collect();
    if lines.is_empty() || lines[0].trim() != "---" {
        return Err(ParseError::MissingFrontmatter);
    }
    let mut end_idx = None;
    for (idx, line) in lines.iter().enumerate().skip(1) {
        if line.trim() == "---" {
            end_idx = Some(idx);
            break;
        }
    }
    let end_idx = end_idx.ok_or(ParseError::MissingFrontmatterEnd)?;
    let front = lines[1..end_idx].join("\n");
    let mut body_lines = &lines[end_idx + 1..];
    // The blank separator line belongs to the format, not the body.
    if body_lines.first().map(|line| line.trim().is_empty()) == Some(true) {
        body_lines = &body_lines[1..];
    }
    Ok((front, body_lines.join("\n")))
}

pub fn decode(text: &str, path: &Path) -> Result<Task, ParseError> {
    let (front, body) = split_front_matter(text)?;
    let value: Value = serde_yaml::from_str(&front)?;
    let Value::Mapping(mapping) = value else {
        return Err(ParseError::NotAMapping);
    };

    let mut data: BTreeMap<String, Value> = BTreeMap::new();
    for (key, value) in mapping {
        if let Some(key) = value_to_string(&key) {
            data.insert(key, value);
        }
    }

    let id = required_string(&data, "id")?;
    let title = required_string(&data, "title")?;
    let status_raw = required_string(&data, "status")?;
    let status = Status::parse(&status_raw).ok_or(ParseError::InvalidField {
        field: "status",
        value: status_raw,
    })?;
    let due = match optional_string(&data, "due") {
        Some(raw) => Some(
            NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|_| ParseError::InvalidField {
                field: "due",
                value: raw,
            })?,
        ),
        None => None,
    };

    let task = Task {
        id,
        title,
        status,
        due,
        project: optional_string(&data, "project"),
        assigned_to: optional_string(&data, "assigned_to"),
        waiting_on: optional_string(&data, "waiting_on"),
        blocked_by: parse_list_value(data.get("blocked_by")),
        blocks: parse_list_value(data.get("blocks")),
        tags: parse_list_value(data.get("tags")),
        time_estimate: optional_string(&data, "time_estimate"),
        created: optional_string(&data, "created").unwrap_or_default(),
        updated: optional_string(&data, "updated").unwrap_or_default(),
        completed: optional_string(&data, "completed"),
        extra: data
            .into_iter()
            .filter(|(key, _)| !KNOWN_KEYS.contains(&key.as_str()))
            .collect(),
        file_path: Some(path.to_path_buf()),
        body,
    };
    Ok(task)
}

pub fn encode(task: &Task) -> String {
    let mut mapping = Mapping::new();
    insert_str(&mut mapping, "id", &task.id);
    insert_str(&mut mapping, "title", &task.title);
    insert_str(&mut mapping, "status", task.status.as_str());
    if let Some(due) = task.due {
        insert_str(&mut mapping, "due", &dates::format_iso(due));
    }
    insert_opt(&mut mapping, "project", task.project.as_deref());
    insert_opt(&mut mapping, "assigned_to", task.assigned_to.as_deref());
    insert_opt(&mut mapping, "waiting_on", task.waiting_on.as_deref());
    insert_list(&mut mapping, "blocked_by", &task.blocked_by);
    insert_list(&mut mapping, "blocks", &task.blocks);
    insert_list(&mut mapping, "tags", &task.tags);
    insert_opt(&mut mapping, "time_estimate", task.time_estimate.as_deref());
    if !task.created.is_empty() {
        insert_str(&mut mapping, "created", &task.created);
    }
    if !task.updated.is_empty() {
        insert_str(&mut mapping, "updated", &task.updated);
    }
    insert_opt(&mut mapping, "completed", task.completed.as_deref());
    for (key, value) in &task.extra {
        mapping.insert(Value::String(key.clone()), value.clone());
    }

    // serde_yaml handles quoting for titles with colons and friends.
    let front = serde_yaml::to_string(&mapping).unwrap_or_default();

    let mut out = String::from("---\n");
    out.push_str(&front);
    out.push_str("---\n");
    if !task.body.is_empty() {
        out.push('\n');
        out.push_str(&task.body);
        if !task.body.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}

fn insert_str(mapping: &mut Mapping, key: &str, value: &str) {
    mapping.insert(
        Value::String(key.to_string()),
        Value::String(value.to_string()),
    );
}

fn insert_opt(mapping: &mut Mapping, key: &str, value: Option<&str>) {
    if let Some(value) = value {
        insert_str(mapping, key, value);
    }
}

fn insert_list(mapping: &mut Mapping, key: &str, values: &[String]) {
    if values.is_empty() {
        return;
    }
    mapping.insert(
        Value::String(key.to_string()),
        Value::Sequence(
            values
                .iter()
                .map(|item| Value::String(item.clone()))
                .collect(),
        ),
    );
}

fn required_string(
    data: &BTreeMap<String, Value>,
    field: &'static str,
) -> Result<String, ParseError> {
    data.get(field)
        .and_then(value_to_string)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or(ParseError::MissingField(field))
}

fn optional_string(data: &BTreeMap<String, Value>, field: &str) -> Option<String> {
    data.get(field)
        .and_then(value_to_string)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn parse_list_value(value: Option<&Value>) -> Vec<String> {
    match value {
        None => Vec::new(),
        Some(Value::Null) => Vec::new(),
        Some(Value::Sequence(seq)) => seq
            .iter()
            .filter_map(value_to_string)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) => parse_list_string(s),
        Some(other) => value_to_string(other)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(|s| vec![s])
            .unwrap_or_default(),
    }
}

fn parse_list_string(value: &str) -> Vec<String> {
    let raw = value.trim();
    if raw.is_empty() || raw == "[]" {
        return Vec::new();
    }
    let inner = if raw.starts_with('[') && raw.ends_with(']') {
        raw[1..raw.len() - 1].trim()
    } else {
        raw
    };
    if inner.is_empty() {
        return Vec::new();
    }
    inner
        .split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(val) => Some(val.clone()),
        Value::Number(num) => Some(num.to_string()),
        Value::Bool(val) => Some(val.to_string()),
        Value::Null => None,
        _ => serde_yaml::to_string(value)
            .ok()
            .map(|s| s.trim().to_string()),
    }
}
