//! Interactive command parsing.

/// One line of REPL input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    /// Blank line; ignored.
    Empty,
    Quit,
    ToggleDevil,
    ToggleSearch,
    Clear,
    Status,
    /// Anything else is sent to the agent.
    Chat(String),
}

impl ReplCommand {
    pub fn parse(line: &str) -> Self {
        match line.trim() {
            "" => Self::Empty,
            "/quit" | "/exit" => Self::Quit,
            "/devil" => Self::ToggleDevil,
            "/search" => Self::ToggleSearch,
            "/clear" => Self::Clear,
            "/status" => Self::Status,
            text => Self::Chat(text.to_string()),
        }
    }
}

pub const BANNER: &str =
    "DevilAgent | /devil toggle mode | /search toggle web | /clear reset | /status | /quit exit\n";
