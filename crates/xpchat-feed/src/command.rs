/// Output of `/help`.
pub const HELP: &str = "COMMANDS: /help • @ia <prompt> (ask the assistant)";

/// Prefix put in front of a prompt forwarded to the room.
pub const ASSISTANT_ECHO_PREFIX: &str = "@IA: ";

/// What a draft body asks for, decided by its prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    /// Local only.
    Help,
    /// `@ia <prompt>` or `@ai <prompt>`, any case.
    Assistant(&'a str),
    Say(&'a str),
}

impl<'a> Command<'a> {
    pub fn parse(input: &'a str) -> Self {
        let text = input.trim();
        if text.eq_ignore_ascii_case("/help") {
            return Self::Help;
        }
        if text.eq_ignore_ascii_case("@ia") || text.eq_ignore_ascii_case("@ai") {
            return Self::Assistant("");
        }
        if let Some(prefix) = text.get(..4) {
            if prefix.eq_ignore_ascii_case("@ia ") || prefix.eq_ignore_ascii_case("@ai ") {
                return Self::Assistant(text[4..].trim());
            }
        }
        Self::Say(text)
    }
}

/// Text written to the room when the assistant is asked something.
pub fn assistant_echo(prompt: &str) -> String {
    format!("{ASSISTANT_ECHO_PREFIX}{prompt}")
}
