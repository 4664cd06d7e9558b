//! Batch export files
//!
//! Writes the tabular record export (CSV, UTF-8, RFC 4180 quoting) and the
//! plain-text link list. Export is a convenience surface; failures here are
//! reported but never affect the crawl itself.

use std::io::Write;
use std::path::Path;

use tracing::info;

use crate::error::StoreError;
use crate::models::{NoteRecord, NoteSummary};
use crate::storage::StoreResult;

const RECORD_HEADER: &[&str] = &[
    "note_id",
    "title",
    "author_name",
    "author_id",
    "publish_time",
    "like_count",
    "collect_count",
    "comment_count",
    "tags",
    "image_count",
    "note_link",
    "complete",
];

const SUMMARY_HEADER: &[&str] = &["note_id", "title", "author", "like_count", "note_link"];

/// Write one detail record per row.
pub fn write_table(records: &[NoteRecord], path: &Path) -> StoreResult<()> {
    let mut file = create(path)?;
    write_row(&mut file, RECORD_HEADER.iter().map(|s| s.to_string()))?;
    for record in records {
        write_row(
            &mut file,
            [
                record.note_id.clone(),
                record.title.clone(),
                record.author.name.clone(),
                record.author.id.clone(),
                record.publish_time.clone(),
                record.like_count.to_string(),
                record.collect_count.to_string(),
                record.comment_count.to_string(),
                record.tags.join(","),
                record.image_links.len().to_string(),
                record.note_link.clone(),
                record.complete.to_string(),
            ]
            .into_iter(),
        )?;
    }
    info!(rows = records.len(), path = %path.display(), "record table written");
    Ok(())
}

/// Write one summary row per search result.
pub fn write_summary_table(summaries: &[NoteSummary], path: &Path) -> StoreResult<()> {
    let mut file = create(path)?;
    write_row(&mut file, SUMMARY_HEADER.iter().map(|s| s.to_string()))?;
    for summary in summaries {
        write_row(
            &mut file,
            [
                summary.note_id.clone(),
                summary.title.clone(),
                summary.author.clone(),
                summary.like_count.to_string(),
                summary.note_link.clone(),
            ]
            .into_iter(),
        )?;
    }
    info!(rows = summaries.len(), path = %path.display(), "summary table written");
    Ok(())
}

/// Write one link per line, the format the detail pipeline reads back.
pub fn write_links(links: &[String], path: &Path) -> StoreResult<()> {
    let mut file = create(path)?;
    for link in links {
        writeln!(file, "{link}")?;
    }
    info!(rows = links.len(), path = %path.display(), "link list written");
    Ok(())
}

fn create(path: &Path) -> StoreResult<std::fs::File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(std::fs::File::create(path)?)
}

fn write_row(
    w: &mut impl Write,
    cells: impl Iterator<Item = String>,
) -> Result<(), StoreError> {
    let mut first = true;
    for cell in cells {
        if !first {
            write!(w, ",")?;
        }
        first = false;
        if needs_quotes(&cell) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            write!(w, "{cell}")?;
        }
    }
    writeln!(w)?;
    Ok(())
}

fn needs_quotes(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NoteRecord;

    #[test]
    fn test_table_quotes_embedded_commas() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.csv");

        let mut record = NoteRecord::incomplete("n1", "https://x/explore/n1");
        record.title = "hello, \"world\"".into();
        record.tags = vec!["a".into(), "b".into()];
        write_table(&[record], &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next().unwrap().split(',').count(), RECORD_HEADER.len());
        let row = lines.next().unwrap();
        assert!(row.contains("\"hello, \"\"world\"\"\""));
        assert!(row.contains("\"a,b\""));
    }

    #[test]
    fn test_links_round_trip_line_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/links.txt");

        let links = vec![
            "https://x/explore/n1".to_string(),
            "https://x/explore/n2".to_string(),
        ];
        write_links(&links, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}
