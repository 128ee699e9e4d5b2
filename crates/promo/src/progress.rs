// AI
//! 📊 progress.rs — "Are we there yet?" — every reload, every time, forever.
//!
//! 🚀 Answers the age-old question: "how far into the promotions file are we?"
//! With cold hard numbers and a progress bar.
//!
//! ⚠️  Staring at the bar does not speed up the reload. The store is the bottleneck.
//! It is always the store.

use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};

// -- 📏 MiB, because the bar reports binary units and we refuse to argue about it
const MIB: u64 = 1024 * 1024;

/// 🔄 Re-render at most once per this many rows. Forty million redraws is a lot of redraws.
const RENDER_EVERY_ROWS: u64 = 4096;

/// 🔢 Thousands separators, so forty million rows doesn't look like a phone number.
/// "1000000 rows" → "1,000,000 rows" — you're welcome, eyes.
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// ⏱️ MM:SS, or HH:MM:SS once a reload has overstayed its welcome.
fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

/// 📊 Bytes and rows read from a source, with a bar to look at while you wait.
///
/// # Ancient Proverb
/// "He who reloads forty million promotions without a progress bar, reloads alone and in darkness."
pub(crate) struct ProgressMetrics {
    /// 🏷️ what are we even reading? shows up in the bar's message
    source_name: String,
    /// 📏 total size in bytes, 0 if we have no idea
    total_size: u64,
    total_bytes: u64,
    total_rows: u64,
    progress_bar: ProgressBar,
    start_time: Instant,
}

impl std::fmt::Debug for ProgressMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // -- 🎭 ProgressBar is a diva and doesn't derive Debug
        f.debug_struct("ProgressMetrics")
            .field("source_name", &self.source_name)
            .field("total_size", &self.total_size)
            .field("total_bytes", &self.total_bytes)
            .field("total_rows", &self.total_rows)
            .finish()
    }
}

impl ProgressMetrics {
    /// 🚀 `total_size` of 0 means "I have no idea", and the bar becomes a spinner.
    pub(crate) fn new(source_name: String, total_size: u64) -> Self {
        let progress_bar = if total_size > 0 {
            let bar = ProgressBar::new(total_size);
            // -- 🎨 cyan because it's classy, blue because it's calm
            if let Ok(style) = ProgressStyle::default_bar().template("{msg}\n| [{bar:40.cyan/blue}]")
            {
                bar.set_style(style.progress_chars("=>-"));
            }
            bar
        } else {
            ProgressBar::new_spinner()
        };

        Self {
            source_name,
            total_size,
            total_bytes: 0,
            total_rows: 0,
            progress_bar,
            start_time: Instant::now(),
        }
    }

    /// 🔄 Feed it fresh numbers after every row. It decides when to actually redraw.
    pub(crate) fn update(&mut self, bytes_read: u64, rows_read: u64) {
        let before = self.total_rows / RENDER_EVERY_ROWS;
        self.total_bytes += bytes_read;
        self.total_rows += rows_read;
        if self.total_rows / RENDER_EVERY_ROWS != before {
            self.render();
        }
    }

    /// ✅ Final redraw and mark the bar done. We made it. (Or we hit EOF. Same energy.)
    pub(crate) fn finish(&self) {
        self.render();
        self.progress_bar.finish();
    }

    fn render(&self) {
        let elapsed = self.start_time.elapsed();
        let secs = elapsed.as_secs_f64();
        let (rows_per_sec, mib_per_sec) = if secs > 0.0 {
            (
                self.total_rows as f64 / secs,
                self.total_bytes as f64 / secs / MIB as f64,
            )
        } else {
            (0.0, 0.0)
        };
        let percent = if self.total_size > 0 {
            self.total_bytes as f64 / self.total_size as f64 * 100.0
        } else {
            0.0
        };

        self.progress_bar.set_message(format!(
            "source: {} | {} rows | {} rows/s | {mib_per_sec:.2} MiB/s | {percent:.2}% | {} elapsed",
            self.source_name,
            format_number(self.total_rows),
            format_number(rows_per_sec as u64),
            format_duration(elapsed),
        ));
        self.progress_bar.set_position(self.total_bytes);
    }
}
