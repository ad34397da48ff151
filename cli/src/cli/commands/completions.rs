//! Shell completion generation.

use clap::CommandFactory;
use clap_complete::{generate, Shell};

use crate::cli::{Cli, ShellType};

/// Handles the `cogauth completions <shell>` command.
pub fn handle_completions(shell: ShellType) {
    let mut cmd = Cli::command();
    let shell = match shell {
        ShellType::Bash => Shell::Bash,
        ShellType::Zsh => Shell::Zsh,
        ShellType::Fish => Shell::Fish,
        ShellType::PowerShell => Shell::PowerShell,
    };

    generate(shell, &mut cmd, "cogauth", &mut std::io::stdout());
}
