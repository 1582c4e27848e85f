//! Task display utilities
//!
//! Consistent task color management for terminal output.

use colored::*;

/// Get a consistent color for a task name.
///
/// Targets share their task's color, so `jshint:all` and `jshint:allTests`
/// read as one family in the run output.
pub fn get_task_color(task_name: &str) -> Color {
    let family = task_name.split(':').next().unwrap_or(task_name);

    // Use a simple hash of the name bytes for consistent colors
    let hash = family
        .bytes()
        .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));

    // Jewel tones that avoid the red/yellow/green used for status lines
    let colors = [
        Color::TrueColor {
            r: 147,
            g: 112,
            b: 219,
        }, // Medium slate blue
        Color::TrueColor {
            r: 64,
            g: 224,
            b: 208,
        }, // Turquoise
        Color::TrueColor {
            r: 255,
            g: 140,
            b: 0,
        }, // Dark orange
        Color::TrueColor {
            r: 199,
            g: 21,
            b: 133,
        }, // Medium violet red
        Color::TrueColor {
            r: 72,
            g: 209,
            b: 204,
        }, // Medium turquoise
        Color::TrueColor {
            r: 138,
            g: 43,
            b: 226,
        }, // Blue violet
    ];

    colors[(hash % colors.len() as u64) as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_targets_share_task_color() {
        assert_eq!(get_task_color("jshint:all"), get_task_color("jshint:allTests"));
        assert_eq!(get_task_color("jshint"), get_task_color("jshint:all"));
    }
}
