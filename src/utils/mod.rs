//! Small shared helpers

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use rand::Rng;

/// Sleep a random duration between `min_ms` and `max_ms` inclusive.
/// Randomized waits keep the request cadence from looking machine-uniform.
pub async fn random_sleep(min_ms: u64, max_ms: u64) {
    let ms = jitter_ms(min_ms, max_ms);
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

/// A random value in `[min_ms, max_ms]`; degenerate bounds collapse to `min_ms`
#[must_use]
pub fn jitter_ms(min_ms: u64, max_ms: u64) -> u64 {
    if min_ms >= max_ms {
        return min_ms;
    }
    rand::thread_rng().gen_range(min_ms..=max_ms)
}

/// Read a work list: one URL per line, blank lines skipped.
pub async fn read_links_from_file(path: &Path) -> Result<Vec<String>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read link file: {}", path.display()))?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Remaining time as `HH:MM` for countdown reporting
#[must_use]
pub fn format_remaining(remaining: Duration) -> String {
    let total_mins = remaining.as_secs() / 60;
    format!("{:02}:{:02}", total_mins / 60, total_mins % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_jitter_within_bounds() {
        for _ in 0..100 {
            let v = jitter_ms(10, 20);
            assert!((10..=20).contains(&v));
        }
        assert_eq!(jitter_ms(5, 5), 5);
        assert_eq!(jitter_ms(9, 3), 9);
    }

    #[test]
    fn test_format_remaining() {
        assert_eq!(format_remaining(Duration::from_secs(12 * 3600)), "12:00");
        assert_eq!(format_remaining(Duration::from_secs(90 * 60)), "01:30");
        assert_eq!(format_remaining(Duration::from_secs(59)), "00:00");
    }

    #[tokio::test]
    async fn test_read_links_skips_blanks() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "https://x/explore/n1").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "  https://x/explore/n2  ").unwrap();

        let links = read_links_from_file(file.path()).await.unwrap();
        assert_eq!(links, vec!["https://x/explore/n1", "https://x/explore/n2"]);
    }
}
