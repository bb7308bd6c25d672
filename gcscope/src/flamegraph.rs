//! Flame-graph style visualization of GC pause distribution over time.
//!
//! Pauses are bucketed two ways at once: by wall-clock window (when in the
//! run did this happen) and by duration class (how bad was it). The result
//! renders as a folded-stack file for external flame-graph tooling and as
//! an ASCII bar chart for the terminal.
//!
//! # Architecture
//!
//! - **`DurationBuckets`** - the duration classification (edges + labels)
//! - **`FlameGraph`** - sample accumulator plus both renderers
//! - **`FlameLine`** - paired plain/colored output line
//!
//! # Performance
//!
//! - `record_sample()`: O(B) for B duration boundaries (B ≤ ~10)
//! - rendering: O(samples log samples), drain-time only

// Share-of-bar math intentionally converts counts and widths through f64
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::domain::Generation;
use crate::report::format_duration;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Fallback duration-class boundaries in milliseconds.
///
/// Used whenever a user-supplied boundary list is empty after filtering
/// out non-positive and unparseable entries.
pub const DEFAULT_BUCKET_EDGES: [f64; 5] = [1.0, 5.0, 20.0, 50.0, 100.0];

/// Narrowest allowed time bucket, in seconds.
pub const MIN_BUCKET_SECS: f64 = 0.1;

/// Narrowest allowed terminal bar, in characters.
pub const MIN_TERMINAL_WIDTH: usize = 40;

/// One glyph per duration class, mild to severe. Classes beyond the
/// palette reuse the last glyph.
const GLYPH_PALETTE: [char; 9] = ['.', ':', '-', '=', '+', '*', '#', '%', '@'];

/// 256-color ANSI codes paired with [`GLYPH_PALETTE`], green through red.
const COLOR_PALETTE: [&str; 9] = [
    "\x1b[38;5;82m",
    "\x1b[38;5;118m",
    "\x1b[38;5;148m",
    "\x1b[38;5;184m",
    "\x1b[38;5;214m",
    "\x1b[38;5;208m",
    "\x1b[38;5;196m",
    "\x1b[38;5;160m",
    "\x1b[38;5;125m",
];

const ANSI_RESET: &str = "\x1b[0m";

// =============================================================================
// DURATION BUCKETS
// =============================================================================

/// Ordered duration classification.
///
/// Boundaries partition `[0, ∞)` into half-open classes: `<first`,
/// `prev-edge`, ..., `>=last`. Every non-negative duration maps to exactly
/// one label.
#[derive(Debug, Clone, PartialEq)]
pub struct DurationBuckets {
    edges: Vec<f64>,
    labels: Vec<String>,
}

impl Default for DurationBuckets {
    fn default() -> Self {
        Self::from_edges(DEFAULT_BUCKET_EDGES.to_vec())
    }
}

impl DurationBuckets {
    /// Build buckets from raw boundary values.
    ///
    /// Non-positive values are dropped, the rest sorted and deduplicated;
    /// an empty result falls back to [`DEFAULT_BUCKET_EDGES`].
    #[must_use]
    pub fn from_edges(edges: Vec<f64>) -> Self {
        let mut edges: Vec<f64> = edges.into_iter().filter(|edge| *edge > 0.0).collect();
        edges.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        edges.dedup();
        if edges.is_empty() {
            edges = DEFAULT_BUCKET_EDGES.to_vec();
        }

        let mut labels = Vec::with_capacity(edges.len() + 1);
        let mut prev: Option<f64> = None;
        for &edge in &edges {
            match prev {
                None => labels.push(format!("<{edge}ms")),
                Some(prev_edge) => labels.push(format!("{prev_edge}-{edge}ms")),
            }
            prev = Some(edge);
        }
        let last = edges[edges.len() - 1];
        labels.push(format!(">={last}ms"));

        Self { edges, labels }
    }

    /// Parse a comma-separated boundary list, e.g. `"1,5,20,50,100"`.
    ///
    /// Unparseable entries are skipped; filtering and fallback follow
    /// [`DurationBuckets::from_edges`].
    #[must_use]
    pub fn parse(spec: &str) -> Self {
        let edges = spec
            .split(',')
            .filter_map(|part| part.trim().parse::<f64>().ok())
            .collect();
        Self::from_edges(edges)
    }

    #[must_use]
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Index of the class containing `duration_ms`. Linear scan; the
    /// boundary count is small by construction.
    #[must_use]
    pub fn label_index(&self, duration_ms: f64) -> usize {
        for (idx, &edge) in self.edges.iter().enumerate() {
            if duration_ms < edge {
                return idx;
            }
        }
        self.edges.len()
    }

    #[must_use]
    pub fn label_for(&self, duration_ms: f64) -> &str {
        &self.labels[self.label_index(duration_ms)]
    }

    /// Bar glyph for a class, clamped to the palette.
    #[must_use]
    pub fn glyph(label_index: usize) -> char {
        GLYPH_PALETTE[label_index.min(GLYPH_PALETTE.len() - 1)]
    }

    /// ANSI color for a class, clamped to the palette.
    #[must_use]
    pub fn color(label_index: usize) -> &'static str {
        COLOR_PALETTE[label_index.min(COLOR_PALETTE.len() - 1)]
    }
}

// =============================================================================
// FLAME GRAPH
// =============================================================================

/// One rendered chart line, in plain text and (optionally) colored form.
///
/// Callers mirror `plain` to log files and print `colored` only to an
/// interactive terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlameLine {
    pub plain: String,
    pub colored: Option<String>,
}

/// Accumulates `(time bucket, generation, duration class)` → total pause
/// milliseconds, and renders the two output formats.
#[derive(Debug)]
pub struct FlameGraph {
    bucket_secs: f64,
    buckets: DurationBuckets,
    samples: BTreeMap<(u64, Generation, usize), f64>,
}

impl FlameGraph {
    /// `bucket_secs` narrower than [`MIN_BUCKET_SECS`] is widened to it.
    #[must_use]
    pub fn new(bucket_secs: f64, buckets: DurationBuckets) -> Self {
        Self { bucket_secs: bucket_secs.max(MIN_BUCKET_SECS), buckets, samples: BTreeMap::new() }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Add one pause into its time/duration cell.
    pub fn record_sample(&mut self, generation: Generation, duration_ms: f64, relative_time: f64) {
        let bucket_index = (relative_time.max(0.0) / self.bucket_secs) as u64;
        let label_index = self.buckets.label_index(duration_ms);
        *self.samples.entry((bucket_index, generation, label_index)).or_insert(0.0) +=
            duration_ms;
    }

    fn time_label(&self, bucket_index: u64) -> String {
        format!("T+{}s", (bucket_index as f64 * self.bucket_secs) as u64)
    }

    /// Write the folded-stack representation, one weighted line per cell.
    ///
    /// The weight is seconds with six decimals, which standard flame-graph
    /// tooling accepts as a fractional sample count.
    pub fn write_folded<W: Write>(&self, mut writer: W) -> io::Result<()> {
        for (&(bucket_index, generation, label_index), &duration_ms) in &self.samples {
            writeln!(
                writer,
                "{};Gen {};{} {:.6}",
                self.time_label(bucket_index),
                generation,
                self.buckets.labels()[label_index],
                duration_ms / 1000.0
            )?;
        }
        Ok(())
    }

    /// Write the folded-stack file at `path`, replacing any previous run.
    pub fn write_folded_file(&self, path: &Path) -> io::Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.write_folded(&mut writer)?;
        writer.flush()
    }

    /// Render the terminal chart: a legend line followed by one bar per
    /// time bucket, ascending.
    ///
    /// Each present `(generation, class)` gets a proportional segment of
    /// at least one glyph, clipped to `width` and padded with spaces. A
    /// bucket whose pauses sum to zero renders an all-space bar. When
    /// `use_color` is off, `colored` is `None` on every line.
    #[must_use]
    pub fn render_terminal(&self, width: usize, use_color: bool) -> Vec<FlameLine> {
        let width = width.max(MIN_TERMINAL_WIDTH);

        // bucket index → (generation, class) → accumulated ms
        let mut rows: BTreeMap<u64, BTreeMap<(Generation, usize), f64>> = BTreeMap::new();
        for (&(bucket_index, generation, label_index), &duration_ms) in &self.samples {
            *rows
                .entry(bucket_index)
                .or_default()
                .entry((generation, label_index))
                .or_insert(0.0) += duration_ms;
        }

        let mut lines = Vec::with_capacity(rows.len() + 1);
        lines.push(self.legend_line(use_color));

        for (&bucket_index, cells) in &rows {
            let total: f64 = cells.values().sum();
            let (bar_plain, bar_colored) = if total <= 0.0 {
                (" ".repeat(width), use_color.then(|| " ".repeat(width)))
            } else {
                render_bar(cells, total, width, use_color)
            };

            let mut gen_totals: BTreeMap<Generation, f64> = BTreeMap::new();
            for (&(generation, _), &duration_ms) in cells {
                *gen_totals.entry(generation).or_insert(0.0) += duration_ms;
            }
            let gen_summary = gen_totals
                .iter()
                .map(|(generation, duration_ms)| {
                    format!("G{generation}:{}", format_duration(*duration_ms))
                })
                .collect::<Vec<_>>()
                .join(", ");

            let time_label = self.time_label(bucket_index);
            let tail = format!("{} ({})", format_duration(total), gen_summary);
            let plain = format!("{time_label:>8} | {bar_plain} | {tail}");
            let colored = bar_colored
                .map(|bar| format!("{time_label:>8} | {bar} | {tail}"));
            lines.push(FlameLine { plain, colored });
        }

        lines
    }

    fn legend_line(&self, use_color: bool) -> FlameLine {
        let plain = format!(
            "Legend: {}",
            self.buckets
                .labels()
                .iter()
                .enumerate()
                .map(|(idx, label)| format!("{}={label}", DurationBuckets::glyph(idx)))
                .collect::<Vec<_>>()
                .join(", ")
        );
        let colored = use_color.then(|| {
            format!(
                "Legend: {}",
                self.buckets
                    .labels()
                    .iter()
                    .enumerate()
                    .map(|(idx, label)| {
                        format!(
                            "{}{}{ANSI_RESET}={label}",
                            DurationBuckets::color(idx),
                            DurationBuckets::glyph(idx)
                        )
                    })
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        });
        FlameLine { plain, colored }
    }
}

/// Lay out one bucket's segments. Returns the plain bar and, when colors
/// are on, its colored twin.
fn render_bar(
    cells: &BTreeMap<(Generation, usize), f64>,
    total: f64,
    width: usize,
    use_color: bool,
) -> (String, Option<String>) {
    let mut plain = String::with_capacity(width);
    let mut colored = use_color.then(String::new);
    let mut remaining = width;

    for (&(_, label_index), &duration_ms) in cells {
        if remaining == 0 {
            break;
        }
        let share = duration_ms / total;
        let segment_width = ((share * width as f64) as usize).max(1);
        let take = segment_width.min(remaining);
        let glyph = DurationBuckets::glyph(label_index);
        let segment: String = std::iter::repeat(glyph).take(take).collect();
        if let Some(colored) = colored.as_mut() {
            colored.push_str(DurationBuckets::color(label_index));
            colored.push_str(&segment);
            colored.push_str(ANSI_RESET);
        }
        plain.push_str(&segment);
        remaining -= take;
    }

    if remaining > 0 {
        let pad = " ".repeat(remaining);
        if let Some(colored) = colored.as_mut() {
            colored.push_str(&pad);
        }
        plain.push_str(&pad);
    }

    (plain, colored)
}
