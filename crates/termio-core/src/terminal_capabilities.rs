#![forbid(unsafe_code)]

//! Terminal capability detection.
//!
//! Detection is environment-based and conservative: when a variable is
//! missing or ambiguous the feature is reported as unavailable. A wrong
//! "no" degrades colors; a wrong "yes" corrupts output.
//!
//! | Variable       | Effect                                          |
//! |----------------|-------------------------------------------------|
//! | `NO_COLOR`     | disables 256-color and true-color output        |
//! | `TERM`         | `dumb` disables everything, `*256*` enables 256 |
//! | `COLORTERM`    | `truecolor` / `24bit` enables true color        |
//! | `TERM_PROGRAM` | known modern terminals enable true color        |
//! | `WT_SESSION`   | Windows Terminal: modern, never dumb            |
//! | `TMUX`         | marks the session as multiplexed                |

use std::env;

#[derive(Debug, Clone, Default)]
pub struct DetectInputs {
    pub no_color: bool,
    pub term: String,
    pub term_program: String,
    pub colorterm: String,
    pub in_tmux: bool,
    pub wt_session: bool,
}

impl DetectInputs {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            no_color: env::var_os("NO_COLOR").is_some(),
            term: env::var("TERM").unwrap_or_default(),
            term_program: env::var("TERM_PROGRAM").unwrap_or_default(),
            colorterm: env::var("COLORTERM").unwrap_or_default(),
            in_tmux: env::var_os("TMUX").is_some(),
            wt_session: env::var_os("WT_SESSION").is_some(),
        }
    }
}

const MODERN_TERMINALS: &[&str] = &[
    "iTerm.app",
    "WezTerm",
    "Alacritty",
    "Ghostty",
    "kitty",
    "Rio",
    "vscode",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalCapabilities {
    pub true_color: bool,
    pub colors_256: bool,
    pub mouse_sgr: bool,
    pub focus_events: bool,
    pub in_mux: bool,
    pub windows_terminal: bool,
}

impl Default for TerminalCapabilities {
    fn default() -> Self {
        Self::basic()
    }
}

impl TerminalCapabilities {
    /// Detect capabilities from the process environment.
    #[must_use]
    pub fn detect() -> Self {
        let caps = Self::from_inputs(&DetectInputs::from_env());
        crate::debug!(
            true_color = caps.true_color,
            colors_256 = caps.colors_256,
            in_mux = caps.in_mux,
            "terminal capabilities detected"
        );
        caps
    }

    #[must_use]
    pub fn from_inputs(env: &DetectInputs) -> Self {
        let term = env.term.as_str();
        let term_program = env.term_program.as_str();
        let colorterm = env.colorterm.as_str();

        // Windows Terminal often omits TERM.
        let is_dumb = term == "dumb" || (term.is_empty() && !env.wt_session);
        let is_modern = env.wt_session
            || MODERN_TERMINALS
                .iter()
                .any(|t| term_program.contains(t) || term.contains(&t.to_lowercase()));

        let true_color = !env.no_color
            && !is_dumb
            && (colorterm.contains("truecolor") || colorterm.contains("24bit") || is_modern);
        let colors_256 = !env.no_color && !is_dumb && (true_color || term.contains("256"));

        Self {
            true_color,
            colors_256,
            mouse_sgr: !is_dumb,
            focus_events: !is_dumb && is_modern,
            in_mux: env.in_tmux,
            windows_terminal: env.wt_session,
        }
    }

    /// Minimal set, safe on any terminal.
    #[must_use]
    pub const fn basic() -> Self {
        Self {
            true_color: false,
            colors_256: false,
            mouse_sgr: false,
            focus_events: false,
            in_mux: false,
            windows_terminal: false,
        }
    }

    #[must_use]
    pub const fn color_depth(&self) -> &'static str {
        if self.true_color {
            "truecolor"
        } else if self.colors_256 {
            "256"
        } else {
            "16"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(term: &str, colorterm: &str) -> DetectInputs {
        DetectInputs {
            term: term.to_owned(),
            colorterm: colorterm.to_owned(),
            ..DetectInputs::default()
        }
    }

    #[test]
    fn dumb_terminal_gets_nothing() {
        let caps = TerminalCapabilities::from_inputs(&inputs("dumb", "truecolor"));
        assert_eq!(caps, TerminalCapabilities::basic());
    }

    #[test]
    fn colorterm_enables_true_color() {
        let caps = TerminalCapabilities::from_inputs(&inputs("xterm-256color", "truecolor"));
        assert!(caps.true_color);
        assert!(caps.colors_256);
        assert_eq!(caps.color_depth(), "truecolor");
    }

    #[test]
    fn term_256_without_colorterm() {
        let caps = TerminalCapabilities::from_inputs(&inputs("screen-256color", ""));
        assert!(!caps.true_color);
        assert!(caps.colors_256);
    }

    #[test]
    fn no_color_wins() {
        let mut env = inputs("xterm-256color", "truecolor");
        env.no_color = true;
        let caps = TerminalCapabilities::from_inputs(&env);
        assert_eq!(caps.color_depth(), "16");
        assert!(caps.mouse_sgr);
    }

    #[test]
    fn windows_terminal_without_term() {
        let env = DetectInputs {
            wt_session: true,
            ..DetectInputs::default()
        };
        let caps = TerminalCapabilities::from_inputs(&env);
        assert!(caps.true_color);
        assert!(caps.windows_terminal);
    }

    #[test]
    fn modern_program_detected() {
        let env = DetectInputs {
            term: "xterm".into(),
            term_program: "WezTerm".into(),
            in_tmux: true,
            ..DetectInputs::default()
        };
        let caps = TerminalCapabilities::from_inputs(&env);
        assert!(caps.true_color);
        assert!(caps.in_mux);
    }
}
