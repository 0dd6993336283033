use crate::models::{NormalizedFileEntry, RawFileBatch, RawFileSubmission};

/// Flattens a submission into one entry per file, in submission order.
/// Positions without a name are skipped.
pub fn normalize(submission: &RawFileSubmission) -> Vec<NormalizedFileEntry> {
    match submission {
        RawFileSubmission::Single(file) if file.name.is_empty() => Vec::new(),
        RawFileSubmission::Single(file) => vec![file.clone().into()],
        RawFileSubmission::Batch(batch) => normalize_batch(batch),
    }
}

fn normalize_batch(batch: &RawFileBatch) -> Vec<NormalizedFileEntry> {
    batch
        .name
        .iter()
        .enumerate()
        .filter(|(_, name)| !name.is_empty())
        .map(|(i, name)| NormalizedFileEntry {
            name: name.clone(),
            mime_type: batch.mime_type.get(i).cloned().unwrap_or_default(),
            tmp_name: batch.tmp_name.get(i).cloned().unwrap_or_default(),
            error: batch.error.get(i).copied().unwrap_or_default(),
            size: batch.size.get(i).copied().unwrap_or_default(),
        })
        .collect()
}
