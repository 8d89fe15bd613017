// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

use std::io::Write;

/// A single line progress bar drawn to stderr.
/// Stdout stays free for results.
pub struct ProgressBar {
    task_name: String,
    total: usize,
    current: usize,
    max_bar_width: usize,
}

impl ProgressBar {
    pub fn new(task_name: String, total_steps: usize) -> ProgressBar {
        ProgressBar {
            task_name,
            total: total_steps,
            current: 0,
            max_bar_width: 99, // Hard code for now
        }
    }

    pub fn is_done(&self) -> bool {
        self.current >= self.total
    }

    fn render(&self, msg: Option<String>) -> String {
        let prefix = format!(
            "{} {}: ",
            if self.is_done() { "[x]" } else { "[ ]" },
            self.task_name
        );
        let postfix = format!(
            " - {}/{}{}",
            self.current,
            self.total,
            msg.map_or(String::new(), |m| format!(" - {}", m))
        );
        let progress_width = self
            .max_bar_width
            .saturating_sub(prefix.len() + postfix.len() + 2);
        let done = if self.total == 0 {
            1.0
        } else {
            self.current as f32 / self.total as f32
        };
        let filled = (done * progress_width as f32) as usize;
        format!(
            "{}|{}{}|{}",
            prefix,
            "▒".repeat(filled),
            "-".repeat(progress_width.saturating_sub(filled)),
            postfix
        )
    }

    /// Updates the progress bar and prints it.
    pub fn update_print(&mut self, new_current: usize, msg: Option<String>) {
        self.current = new_current.min(self.total);
        let mut err = std::io::stderr().lock();
        // Progress output is cosmetic. Failing to draw it is ignored.
        let _ = write!(err, "{} \r", self.render(msg));
        if self.is_done() {
            let _ = writeln!(err);
        }
        let _ = err.flush();
    }

    /// Advances the bar by one step.
    pub fn tick(&mut self, msg: Option<String>) {
        self.update_print(self.current + 1, msg);
    }
}
