//! Renders the fake "thinking" progress indicator. Pure functions; pacing
//! between steps is the orchestrator's concern.

/// Number of cells in the progress bar.
const CELLS: usize = 20;

const FILLED: char = '▰';
const EMPTY: char = '▱';

/// Text of the message the animation starts from.
pub const OPENING: &str = "🧠 Starting analysis... 0%";

/// The fixed animation sequence of (phrase, percent) pairs.
#[must_use]
pub fn steps() -> Vec<(&'static str, u8)> {
    let phrases = [
        "🧠 Analyzing...",
        "💭 Thinking...",
        "📝 Drafting...",
        "✅ Finalizing...",
    ];
    let percentages = [20u8, 40, 60, 80, 100];
    // zip truncates to the shorter side; the 100% step is never shown.
    phrases.into_iter().zip(percentages).collect()
}

/// Render a 20-cell bar where `min(percent / 5, 20)` cells are filled.
#[must_use]
pub fn bar(percent: u8) -> String {
    let filled = usize::from(percent / 5).min(CELLS);
    let mut out = String::with_capacity(CELLS * FILLED.len_utf8());
    for _ in 0..filled {
        out.push(FILLED);
    }
    for _ in filled..CELLS {
        out.push(EMPTY);
    }
    out
}

/// Render one animation frame.
#[must_use]
pub fn render(phrase: &str, percent: u8) -> String {
    format!("{phrase}\n[{bar}] {percent}%", bar = bar(percent))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_is_always_twenty_cells() {
        for percent in (0..=100).step_by(5) {
            assert_eq!(bar(percent).chars().count(), CELLS);
        }
    }

    #[test]
    fn filled_cells_follow_percent() {
        for percent in (0..=100u8).step_by(5) {
            let expected = usize::from(percent / 5).min(CELLS);
            let rendered = bar(percent);
            assert_eq!(rendered.chars().filter(|c| *c == FILLED).count(), expected);
            assert_eq!(
                rendered.chars().filter(|c| *c == EMPTY).count(),
                CELLS - expected
            );
        }
    }

    #[test]
    fn bar_saturates_above_hundred() {
        assert_eq!(bar(200).chars().filter(|c| *c == FILLED).count(), CELLS);
    }

    #[test]
    fn render_frame_format() {
        let frame = render("💭 Thinking...", 40);
        assert_eq!(frame, format!("💭 Thinking...\n[{}] 40%", bar(40)));
    }

    #[test]
    fn sequence_is_four_steps_ascending() {
        let steps = steps();
        assert_eq!(steps.len(), 4);
        assert_eq!(steps[0], ("🧠 Analyzing...", 20));
        assert_eq!(steps[3], ("✅ Finalizing...", 80));
        assert!(steps.windows(2).all(|w| w[0].1 < w[1].1));
    }
}
