//! Text rendering of model records

use std::fmt;

use glbdash_core::{format_date, format_file_size, format_timestamp, ModelRecord};

/// Tags shown on a card before the rest collapse into `+N`
pub const CARD_TAG_LIMIT: usize = 3;

/// Tag list as shown on a card, e.g. `chair, wood, oak +2`
pub fn tag_summary(tags: &[String]) -> String {
    let mut summary = tags
        .iter()
        .take(CARD_TAG_LIMIT)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if tags.len() > CARD_TAG_LIMIT {
        summary.push_str(&format!(" +{}", tags.len() - CARD_TAG_LIMIT));
    }
    summary
}

/// Compact listing entry
pub struct ModelCard<'a>(pub &'a ModelRecord);

impl fmt::Display for ModelCard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let model = self.0;
        writeln!(f, "{}  [{}]  ({})", model.name, model.category, model.id)?;
        if let Some(description) = model.description() {
            writeln!(f, "  {}", description)?;
        }
        if !model.tags.is_empty() {
            writeln!(f, "  tags: {}", tag_summary(&model.tags))?;
        }
        write!(
            f,
            "  {} | {}",
            format_file_size(model.file_size),
            format_date(&model.upload_date)
        )
    }
}

/// Full detail panel for the selected model
pub struct ModelDetails<'a>(pub &'a ModelRecord);

impl fmt::Display for ModelDetails<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let model = self.0;
        writeln!(f, "{}", model.name)?;
        if let Some(description) = model.description() {
            writeln!(f, "{}", description)?;
        }
        writeln!(
            f,
            "Uploaded: {}  Size: {}  Category: {}",
            format_date(&model.upload_date),
            format_file_size(model.file_size),
            model.category
        )?;
        if !model.tags.is_empty() {
            writeln!(f, "\nTags: {}", model.tags.join(", "))?;
        }
        writeln!(f, "\nFile Information")?;
        writeln!(f, "  Original Name: {}", model.original_name)?;
        writeln!(f, "  File Type:     GLB (Binary GLTF)")?;
        writeln!(f, "  Upload Date:   {}", format_timestamp(&model.upload_date))?;
        write!(f, "  Last Updated:  {}", format_timestamp(&model.updated_at))
    }
}
