//! Terminal detection for spinners and colored output

use is_terminal::IsTerminal;
use std::env;
use std::io::{stderr, stdout};

const CI_VARS: [&str; 11] = [
    "CI",
    "CONTINUOUS_INTEGRATION",
    "JENKINS_URL",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "TRAVIS",
    "CIRCLECI",
    "BUILDKITE",
    "DRONE",
    "TEAMCITY_VERSION",
    "TF_BUILD",
];

/// Check if stdout is connected to an interactive terminal
pub fn is_interactive() -> bool {
    if !stdout().is_terminal() {
        return false;
    }

    // CI runners sometimes allocate a TTY
    if is_ci_environment() {
        return false;
    }

    env::var("DEBIAN_FRONTEND").unwrap_or_default() != "noninteractive"
}

/// Check if the terminal understands ANSI escape codes
pub fn supports_ansi() -> bool {
    if !is_interactive() {
        return false;
    }

    let term = env::var("TERM").unwrap_or_default();
    !(term == "dumb" || term.is_empty()) || cfg!(windows)
}

fn is_ci_environment() -> bool {
    CI_VARS.iter().any(|var| env::var(var).is_ok())
}

/// Whether the hashing spinner should be drawn
///
/// The spinner goes to stderr, so both streams must be terminals.
/// `enabled` is the user's preference from config or `--no-progress`.
pub fn should_show_progress(enabled: bool) -> bool {
    enabled && is_interactive() && stderr().is_terminal() && supports_ansi()
}

/// Whether output should be colored
///
/// `NO_COLOR` always wins over configuration.
pub fn should_color(enabled: bool) -> bool {
    enabled && env::var_os("NO_COLOR").is_none() && supports_ansi()
}
