// sagaflow/src/workflow/context.rs

//! The data bag threaded through one record-intake run, and the builder that
//! validates caller input before a run can start.

use crate::core::progress::{self, ProgressSink};
use crate::services::ChannelHandle;
use crate::workflow::error::WorkflowError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Content types accepted for batch files.
pub const ALLOWED_BATCH_CONTENT_TYPES: [&str; 3] = ["image/png", "image/jpg", "image/jpeg"];

/// One gradable item submitted with the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDescriptor {
  /// 1-based number of the parent item.
  pub item_number: u32,
  /// Free-form type tag, e.g. "short_answer".
  pub item_type: String,
  /// 1-based number within the parent when the item is a sub-item.
  pub sub_item_number: Option<u32>,
  pub answer: String,
  pub answer_count: u32,
  pub score: f64,
}

impl ItemDescriptor {
  /// An item is rejected when it carries neither an answer nor a score.
  pub fn is_blank(&self) -> bool {
    self.answer.trim().is_empty() && self.score == 0.0
  }

  /// Flattens drafted questions into the numbered descriptor list the record
  /// service expects. Questions with sub-questions contribute one descriptor per
  /// sub-question; the rest contribute one descriptor with no sub-number.
  pub fn flatten(drafts: &[QuestionDraft]) -> Vec<ItemDescriptor> {
    let mut items = Vec::new();
    for (q_idx, q) in drafts.iter().enumerate() {
      let item_number = (q_idx + 1) as u32;
      if q.sub_questions.is_empty() {
        items.push(ItemDescriptor {
          item_number,
          item_type: q.item_type.clone(),
          sub_item_number: None,
          answer: q.answer.clone(),
          answer_count: 1,
          score: q.score,
        });
        continue;
      }
      for (sq_idx, sq) in q.sub_questions.iter().enumerate() {
        items.push(ItemDescriptor {
          item_number,
          item_type: sq.item_type.clone(),
          sub_item_number: Some((sq_idx + 1) as u32),
          answer: sq.answer.clone(),
          answer_count: 1,
          score: sq.score,
        });
      }
    }
    items
  }
}

/// A question as drafted by the caller, before numbering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuestionDraft {
  pub item_type: String,
  pub answer: String,
  pub score: f64,
  pub sub_questions: Vec<SubQuestionDraft>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubQuestionDraft {
  pub item_type: String,
  pub answer: String,
  pub score: f64,
}

/// A local file to be uploaded. The bytes are shared, so cloning is cheap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
  pub name: String,
  pub content_type: Option<String>,
  pub bytes: Arc<[u8]>,
}

impl FileHandle {
  pub fn new(name: impl Into<String>, content_type: Option<&str>, bytes: impl Into<Arc<[u8]>>) -> Self {
    Self {
      name: name.into(),
      content_type: content_type.map(str::to_string),
      bytes: bytes.into(),
    }
  }

  pub fn len(&self) -> usize {
    self.bytes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.bytes.is_empty()
  }
}

/// Caller-provided fields. Steps read these and never write them.
#[derive(Debug, Clone)]
pub struct WorkflowInput {
  pub record_name: String,
  pub record_date: NaiveDate,
  pub items: Vec<ItemDescriptor>,
  pub primary_file: Option<FileHandle>,
  pub batch_files: Vec<FileHandle>,
}

/// Fields written by the steps. Each field is owned by exactly one step.
#[derive(Debug, Clone, Default)]
pub struct WorkflowOutput {
  /// Written by the create-record step.
  pub record_id: Option<i64>,
  pub record_code: Option<String>,
  /// Written by the open-channel step.
  pub channel: Option<ChannelHandle>,
  /// Written by the upload-primary-file step.
  pub primary_file_refs: Vec<String>,
  /// Written by the upload-batch-files step, one key per completed upload.
  pub uploaded_keys: Vec<String>,
}

/// Context for a single workflow run. Build one with [`ContextBuilder`]; never
/// reuse it for a second run.
pub struct WorkflowContext {
  pub(crate) input: WorkflowInput,
  pub output: WorkflowOutput,
  pub(crate) progress: Option<ProgressSink>,
}

impl WorkflowContext {
  pub fn input(&self) -> &WorkflowInput {
    &self.input
  }

  pub(crate) fn report(&self, message: &str) {
    progress::report(self.progress.as_ref(), message);
  }
}

impl std::fmt::Debug for WorkflowContext {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("WorkflowContext")
      .field("input", &self.input)
      .field("output", &self.output)
      .field("progress_sink_present", &self.progress.is_some())
      .finish()
  }
}

/// Collects and validates the input of a run.
pub struct ContextBuilder {
  record_name: String,
  record_date: NaiveDate,
  items: Vec<ItemDescriptor>,
  primary_file: Option<FileHandle>,
  batch_files: Vec<FileHandle>,
  progress: Option<ProgressSink>,
}

impl ContextBuilder {
  pub fn new(record_name: impl Into<String>, record_date: NaiveDate) -> Self {
    Self {
      record_name: record_name.into(),
      record_date,
      items: Vec::new(),
      primary_file: None,
      batch_files: Vec::new(),
      progress: None,
    }
  }

  pub fn item(mut self, item: ItemDescriptor) -> Self {
    self.items.push(item);
    self
  }

  pub fn items(mut self, items: impl IntoIterator<Item = ItemDescriptor>) -> Self {
    self.items.extend(items);
    self
  }

  pub fn primary_file(mut self, file: FileHandle) -> Self {
    self.primary_file = Some(file);
    self
  }

  pub fn batch_file(mut self, file: FileHandle) -> Self {
    self.batch_files.push(file);
    self
  }

  pub fn batch_files(mut self, files: impl IntoIterator<Item = FileHandle>) -> Self {
    self.batch_files.extend(files);
    self
  }

  pub fn on_progress<F>(mut self, sink: F) -> Self
  where
    F: Fn(&str) + Send + Sync + 'static,
  {
    self.progress = Some(Arc::new(sink));
    self
  }

  pub fn progress_sink(mut self, sink: ProgressSink) -> Self {
    self.progress = Some(sink);
    self
  }

  pub fn build(self) -> Result<WorkflowContext, WorkflowError> {
    let mut problems = Vec::new();

    if self.record_name.trim().is_empty() {
      problems.push("record name is blank".to_string());
    }
    if self.items.is_empty() {
      problems.push("at least one item is required".to_string());
    }
    for item in self.items.iter().filter(|i| i.is_blank()) {
      problems.push(match item.sub_item_number {
        Some(sub) => format!("item {}-{} has no answer and a zero score", item.item_number, sub),
        None => format!("item {} has no answer and a zero score", item.item_number),
      });
    }
    let unsupported: Vec<&str> = self
      .batch_files
      .iter()
      .filter(|f| {
        f.content_type
          .as_deref()
          .is_some_and(|ct| !ALLOWED_BATCH_CONTENT_TYPES.contains(&ct))
      })
      .map(|f| f.name.as_str())
      .collect();
    if !unsupported.is_empty() {
      problems.push(format!(
        "unsupported image type (png, jpg, jpeg only): {}",
        unsupported.join(", ")
      ));
    }

    if !problems.is_empty() {
      return Err(WorkflowError::InvalidInput(problems.join("; ")));
    }

    Ok(WorkflowContext {
      input: WorkflowInput {
        record_name: self.record_name,
        record_date: self.record_date,
        items: self.items,
        primary_file: self.primary_file,
        batch_files: self.batch_files,
      },
      output: WorkflowOutput::default(),
      progress: self.progress,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
  }

  fn item(answer: &str, score: f64) -> ItemDescriptor {
    ItemDescriptor {
      item_number: 1,
      item_type: "short_answer".into(),
      sub_item_number: None,
      answer: answer.into(),
      answer_count: 1,
      score,
    }
  }

  #[test]
  fn flatten_numbers_questions_and_sub_questions() {
    let drafts = vec![
      QuestionDraft {
        item_type: "choice".into(),
        answer: "3".into(),
        score: 2.0,
        sub_questions: vec![],
      },
      QuestionDraft {
        item_type: "ignored".into(),
        answer: String::new(),
        score: 0.0,
        sub_questions: vec![
          SubQuestionDraft { item_type: "short".into(), answer: "a".into(), score: 1.0 },
          SubQuestionDraft { item_type: "short".into(), answer: "b".into(), score: 1.5 },
        ],
      },
    ];

    let items = ItemDescriptor::flatten(&drafts);
    let numbering: Vec<(u32, Option<u32>)> = items.iter().map(|i| (i.item_number, i.sub_item_number)).collect();
    assert_eq!(numbering, vec![(1, None), (2, Some(1)), (2, Some(2))]);
    assert_eq!(items[2].score, 1.5);
    assert_eq!(items[1].item_type, "short");
  }

  #[test]
  fn build_rejects_blank_items_and_bad_image_types() {
    let err = ContextBuilder::new("Midterm", date())
      .item(item("", 0.0))
      .batch_file(FileHandle::new("scan.gif", Some("image/gif"), vec![1u8]))
      .build()
      .unwrap_err();

    let WorkflowError::InvalidInput(msg) = err else {
      panic!("expected InvalidInput");
    };
    assert!(msg.contains("item 1 has no answer"));
    assert!(msg.contains("scan.gif"));
  }

  #[test]
  fn build_accepts_answer_without_score_and_untyped_files() {
    let ctx = ContextBuilder::new("Midterm", date())
      .item(item("42", 0.0))
      .batch_file(FileHandle::new("scan", None, vec![1u8, 2, 3]))
      .build()
      .expect("valid input");

    assert_eq!(ctx.input().batch_files.len(), 1);
    assert!(ctx.output.record_code.is_none());
  }

  #[test]
  fn build_rejects_blank_name_and_empty_items() {
    let err = ContextBuilder::new("  ", date()).build().unwrap_err();
    let WorkflowError::InvalidInput(msg) = err else {
      panic!("expected InvalidInput");
    };
    assert!(msg.contains("record name is blank"));
    assert!(msg.contains("at least one item"));
  }
}
