use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use serde_yaml::Value;

use taskvault_core::frontmatter::{decode, encode};
use taskvault_core::task::{Status, Task};

fn full_task() -> Task {
    let mut extra = BTreeMap::new();
    extra.insert(
        "energy".to_string(),
        Value::String("low".to_string()),
    );
    extra.insert(
        "review_count".to_string(),
        Value::Number(serde_yaml::Number::from(3u64)),
    );
    Task {
        id: "7KQM".to_string(),
        title: "Call: dentist about the invoice".to_string(),
        status: Status::Waiting,
        due: NaiveDate::from_ymd_opt(2026, 8, 14),
        project: Some("[[Health]]".to_string()),
        assigned_to: Some("me".to_string()),
        waiting_on: Some("dentist office".to_string()),
        blocked_by: vec!["A2B3".to_string(), "X9YZ".to_string()],
        blocks: vec!["Q4RS".to_string()],
        tags: vec!["phone".to_string(), "errand".to_string()],
        time_estimate: Some("15m".to_string()),
        created: "2026-08-01T09:30:00".to_string(),
        updated: "2026-08-05T18:02:11".to_string(),
        completed: None,
        extra,
        file_path: Some(PathBuf::from("Waiting/7KQM.md")),
        body: "Left a voicemail on Monday.\n\n- [ ] call again Friday".to_string(),
    }
}

#[test]
fn round_trip_reproduces_every_field() {
    let task = full_task();
    let text = encode(&task);
    let decoded = decode(&text, Path::new("Waiting/7KQM.md")).expect("decode");
    assert_eq!(decoded, task);
}

#[test]
fn round_trip_of_completed_task() {
    let mut task = full_task();
    task.status = Status::Completed;
    task.completed = Some("2026-08-05T18:02:11".to_string());
    task.file_path = Some(PathBuf::from("Completed/7KQM.md"));
    let text = encode(&task);
    let decoded = decode(&text, Path::new("Completed/7KQM.md")).expect("decode");
    assert_eq!(decoded, task);
}

#[test]
fn encode_separates_frontmatter_and_body_with_blank_line() {
    let task = full_task();
    let text = encode(&task);
    assert!(text.starts_with("---\n"));
    assert!(text.contains("---\n\nLeft a voicemail"));
}

#[test]
fn encode_omits_empty_optionals() {
    let mut task = full_task();
    task.project = None;
    task.blocked_by.clear();
    task.blocks.clear();
    let text = encode(&task);
    assert!(!text.contains("project"));
    assert!(!text.contains("blocked_by"));
    assert!(!text.contains("blocks"));
}

#[test]
fn decode_populates_path_from_location() {
    let task = full_task();
    let text = encode(&task);
    let decoded = decode(&text, Path::new("Waiting/7KQM.md")).expect("decode");
    assert_eq!(decoded.file_path, Some(PathBuf::from("Waiting/7KQM.md")));
}

#[test]
fn unknown_fields_survive_a_rewrite() {
    let text = "---\nid: 7KQM\ntitle: Example\nstatus: inbox\npriority: high\nreview:\n  last: 2026-07-01\n---\n\nBody.\n";
    let decoded = decode(text, Path::new("Inbox/7KQM.md")).expect("decode");
    assert!(decoded.extra.contains_key("priority"));
    assert!(decoded.extra.contains_key("review"));

    let rewritten = encode(&decoded);
    let again = decode(&rewritten, Path::new("Inbox/7KQM.md")).expect("decode again");
    assert_eq!(again.extra, decoded.extra);
}

#[test]
fn decode_accepts_flow_style_lists() {
    let text =
        "---\nid: 7KQM\ntitle: Example\nstatus: next\ntags: [deep, focus]\nblocked_by: [A2B3]\n---\n";
    let decoded = decode(text, Path::new("Next/7KQM.md")).expect("decode");
    assert_eq!(decoded.tags, vec!["deep", "focus"]);
    assert_eq!(decoded.blocked_by, vec!["A2B3"]);
}

#[test]
fn missing_required_fields_are_parse_errors() {
    for text in [
        "---\ntitle: No id\nstatus: inbox\n---\n",
        "---\nid: 7KQM\nstatus: inbox\n---\n",
        "---\nid: 7KQM\ntitle: No status\n---\n",
    ] {
        assert!(decode(text, Path::new("Inbox/x.md")).is_err(), "{text}");
    }
}
