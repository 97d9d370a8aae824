use crate::cli::ColorChoice;
use std::io::IsTerminal;

/// Apply the color choice to `colored` and report whether diagnostics get color
pub fn init(choice: ColorChoice) -> bool {
    let should_color = match choice {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => {
            // Respect NO_COLOR (https://no-color.org/)
            std::env::var_os("NO_COLOR").is_none() && std::io::stderr().is_terminal()
        }
    };

    colored::control::set_override(should_color);
    should_color
}
