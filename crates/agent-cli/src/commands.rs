/// Slash commands understood by the interactive shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Model(String),
    Models,
    System(String),
    Clear,
    Tools,
    Quit,
    Help,
    Unknown(String),
}

/// `None` when the line is a message for the agent.
pub fn parse_slash_command(line: &str) -> Option<SlashCommand> {
    let line = line.trim();
    let rest = line.strip_prefix('/')?;
    let (name, argument) = match rest.split_once(char::is_whitespace) {
        Some((name, argument)) => (name, argument.trim()),
        None => (rest, ""),
    };

    let command = match name {
        "model" if !argument.is_empty() => SlashCommand::Model(argument.to_string()),
        "model" | "models" => SlashCommand::Models,
        "system" => SlashCommand::System(argument.to_string()),
        "clear" => SlashCommand::Clear,
        "tools" => SlashCommand::Tools,
        "quit" | "exit" => SlashCommand::Quit,
        "help" => SlashCommand::Help,
        other => SlashCommand::Unknown(other.to_string()),
    };
    Some(command)
}

pub const HELP: &str = "\
/model <key>     switch model for the next message
/models          list configured models
/system <text>   replace the system prompt
/clear           forget the conversation
/tools           list available tools
/quit            leave";
