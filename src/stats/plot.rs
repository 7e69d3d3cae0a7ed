//! Histogram plot data.
//!
//! Rendering is left to external tools; this module only selects the
//! interesting range of bins and writes it out as CSV.

use super::accumulator::{bin_lower_bound, StatAccumulator};
use crate::error::FairnessResult;
use std::io::Write;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Histograms with fewer samples than this are not plotted.
pub const MIN_PLOT_SAMPLES: u64 = 100;

/// One plotted bin: its lower edge and how many samples it holds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramPoint {
    pub value: f64,
    pub count: u64,
}

/// Bins worth plotting.
///
/// Starts at the first non-empty bin and ends with the first bin of the
/// first run of two consecutive empty bins, so the plotted curve drops to
/// zero once. Past the last bin counts as empty. Single empty bins between
/// populated ones are kept. Returns `None` if every bin is empty.
pub fn trimmed_range(bins: &[u64]) -> Option<Range<usize>> {
    let start = bins.iter().position(|&n| n > 0)?;
    let mut end = start;
    while end < bins.len() {
        let next_empty = bins.get(end + 1).map_or(true, |&n| n == 0);
        if bins[end] == 0 && next_empty {
            return Some(start..end + 1);
        }
        end += 1;
    }
    Some(start..end)
}

/// Plot points for a histogram, or `None` when below [`MIN_PLOT_SAMPLES`].
pub fn plot_points(acc: &StatAccumulator) -> Option<Vec<HistogramPoint>> {
    if acc.count() < MIN_PLOT_SAMPLES {
        return None;
    }
    let bins = acc.bins();
    let range = trimmed_range(bins)?;
    Some(
        range
            .map(|i| HistogramPoint {
                value: bin_lower_bound(i),
                count: bins[i],
            })
            .collect(),
    )
}

/// Writes latency histograms as numbered CSV files into a directory.
#[derive(Debug)]
pub struct PlotWriter {
    dir: PathBuf,
    next: usize,
}

impl PlotWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            next: 0,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `acc` as `histogram_<tag>_<nn>.csv`; values are converted from
    /// nanoseconds to microseconds. Returns the file written, if any.
    pub fn write(&mut self, tag: &str, acc: &StatAccumulator) -> FairnessResult<Option<PathBuf>> {
        let Some(points) = plot_points(acc) else {
            debug!(
                operation = "plot_skipped",
                tag = tag,
                samples = acc.count(),
                "Too few samples to plot"
            );
            return Ok(None);
        };

        std::fs::create_dir_all(&self.dir)?;
        let path = self
            .dir
            .join(format!("histogram_{}_{:02}.csv", sanitize_tag(tag), self.next));
        self.next += 1;

        let mut file = std::io::BufWriter::new(std::fs::File::create(&path)?);
        writeln!(file, "# {} Histogram (Total Samples={})", tag, acc.count())?;
        writeln!(file, "value_us,count")?;
        for point in &points {
            writeln!(file, "{:.6},{}", point.value / 1000.0, point.count)?;
        }
        file.flush()?;

        debug!(
            operation = "plot_written",
            path = %path.display(),
            bins = points.len()
        );
        Ok(Some(path))
    }
}

/// Reduce a tracker label to something usable in a file name.
fn sanitize_tag(tag: &str) -> String {
    let mut out = String::with_capacity(tag.len());
    for c in tag.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_trimmed_range_empty() {
        assert_eq!(trimmed_range(&[0, 0, 0]), None);
    }

    #[test]
    fn test_trimmed_range_keeps_single_gaps() {
        let bins = [0, 0, 3, 0, 5, 1, 0, 0, 9];
        assert_eq!(trimmed_range(&bins), Some(2..7));
    }

    #[test]
    fn test_trimmed_range_runs_to_end() {
        let bins = [0, 2, 4];
        assert_eq!(trimmed_range(&bins), Some(1..3));

        // A trailing empty bin is kept as the terminating zero
        let bins = [1, 2, 0];
        assert_eq!(trimmed_range(&bins), Some(0..3));
    }

    #[test]
    fn test_plot_points_threshold() {
        let mut acc = StatAccumulator::new();
        for _ in 0..(MIN_PLOT_SAMPLES - 1) {
            acc.add(50.0);
        }
        assert!(plot_points(&acc).is_none());

        acc.add(50.0);
        let points = plot_points(&acc).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].count, MIN_PLOT_SAMPLES);
        assert_eq!(points[1].count, 0);
        assert!(points[0].value <= 50.0);
    }

    #[test]
    fn test_plot_writer_numbers_files() {
        let dir = TempDir::new().unwrap();
        let mut writer = PlotWriter::new(dir.path());

        let mut acc = StatAccumulator::new();
        for i in 0..200 {
            acc.add(100.0 + i as f64);
        }

        let first = writer.write("Global counter 0 tight:", &acc).unwrap().unwrap();
        let second = writer.write("Global counter 0 tight:", &acc).unwrap().unwrap();

        assert_eq!(
            first.file_name().unwrap().to_str().unwrap(),
            "histogram_Global_counter_0_tight_00.csv"
        );
        assert!(second.to_str().unwrap().ends_with("_01.csv"));

        let content = std::fs::read_to_string(&first).unwrap();
        assert!(content.contains("value_us,count"));
        let total: u64 = content
            .lines()
            .skip(2)
            .map(|l| l.split(',').nth(1).unwrap().parse::<u64>().unwrap())
            .sum();
        assert_eq!(total, 200);
    }

    #[test]
    fn test_plot_writer_skips_small_histograms() {
        let dir = TempDir::new().unwrap();
        let mut writer = PlotWriter::new(dir.path().join("plots"));
        let mut acc = StatAccumulator::new();
        acc.add(1.0);
        assert!(writer.write("tiny", &acc).unwrap().is_none());
        assert!(!writer.dir().exists());
    }
}
