//! Commands — verbs and the quote-aware tokenizer.
//!
//! A command is a chat message of the form
//! `<marker><verb> arg "quoted arg" ...`. The tokenizer only splits text; it
//! knows nothing about entities. Mapping a verb string onto a [`Verb`] is a
//! separate step so unknown verbs can fall through to natural language.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Default leading marker for commands.
pub const DEFAULT_MARKER: &str = "/";

const QUOTE: char = '"';

/// Every verb the router understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    TurnOn,
    TurnOff,
    Toggle,
    Script,
    Climate,
    Info,
    Light,
    Switch,
    Search,
    Help,
    Refresh,
    Clear,
    Echo,
}

/// Authorization class of a verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbClass {
    /// Changes the state of the home.
    Mutating,
    /// Changes bridge state (cache, conversation session).
    Administrative,
    /// Only reads.
    ReadOnly,
}

impl Verb {
    pub const ALL: [Self; 13] = [
        Self::Help,
        Self::Info,
        Self::TurnOn,
        Self::TurnOff,
        Self::Toggle,
        Self::Light,
        Self::Switch,
        Self::Script,
        Self::Climate,
        Self::Search,
        Self::Refresh,
        Self::Clear,
        Self::Echo,
    ];

    /// Keyword typed after the marker.
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            Self::TurnOn => "turnon",
            Self::TurnOff => "turnoff",
            Self::Toggle => "toggle",
            Self::Script => "script",
            Self::Climate => "climate",
            Self::Info => "info",
            Self::Light => "light",
            Self::Switch => "switch",
            Self::Search => "search",
            Self::Help => "help",
            Self::Refresh => "refresh",
            Self::Clear => "clear",
            Self::Echo => "echo",
        }
    }

    #[must_use]
    pub fn class(self) -> VerbClass {
        match self {
            Self::TurnOn | Self::TurnOff | Self::Toggle | Self::Script | Self::Climate => {
                VerbClass::Mutating
            }
            Self::Refresh | Self::Clear => VerbClass::Administrative,
            Self::Info | Self::Light | Self::Switch | Self::Search | Self::Help | Self::Echo => {
                VerbClass::ReadOnly
            }
        }
    }

    #[must_use]
    pub fn is_mutating(self) -> bool {
        self.class() == VerbClass::Mutating
    }

    /// Whether an allow-list applies to this verb.
    #[must_use]
    pub fn requires_permission(self) -> bool {
        self.class() != VerbClass::ReadOnly
    }

    /// Platform service name for the on/off/toggle family.
    #[must_use]
    pub fn switch_service(self) -> Option<&'static str> {
        match self {
            Self::TurnOn => Some("turn_on"),
            Self::TurnOff => Some("turn_off"),
            Self::Toggle => Some("toggle"),
            _ => None,
        }
    }

    /// Usage line shown by `help` and on argument errors.
    #[must_use]
    pub fn usage(self) -> &'static str {
        match self {
            Self::TurnOn => "turnon <entity> [<entity> ...]",
            Self::TurnOff => "turnoff <entity> [<entity> ...]",
            Self::Toggle => "toggle <entity> [<entity> ...]",
            Self::Script => "script <script_id>",
            Self::Climate => "climate <entity> [mode] [temperature]",
            Self::Info => "info",
            Self::Light => "light",
            Self::Switch => "switch",
            Self::Search => "search <query>",
            Self::Help => "help",
            Self::Refresh => "refresh",
            Self::Clear => "clear",
            Self::Echo => "echo <text>",
        }
    }

    /// One-line description shown by `help`.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::TurnOn => "turn on one or more entities (id, friendly name or alias)",
            Self::TurnOff => "turn off one or more entities (id, friendly name or alias)",
            Self::Toggle => "toggle one or more entities (id, friendly name or alias)",
            Self::Script => "run a script",
            Self::Climate => "set a climate unit's mode (cool/heat/fan_only/off) and/or temperature",
            Self::Info => "summarise the current state of the home",
            Self::Light => "list lights grouped by area",
            Self::Switch => "list switches grouped by area",
            Self::Search => "search entities by id, friendly name or alias",
            Self::Help => "show this list",
            Self::Refresh => "reload the entity directory",
            Self::Clear => "forget this group's conversation context",
            Self::Echo => "repeat the given text",
        }
    }
}

impl FromStr for Verb {
    type Err = UnknownVerb;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|verb| verb.keyword() == lowered)
            .ok_or(UnknownVerb(lowered))
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A verb keyword that names no [`Verb`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown verb {0:?}")]
pub struct UnknownVerb(pub String);

/// Output of the tokenizer: lowercase verb plus ordered arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedCommand {
    pub verb: String,
    pub args: Vec<String>,
    /// `quoted[i]` is true when `args[i]` came (at least partly) from a quoted span.
    pub quoted: Vec<bool>,
}

impl ParsedCommand {
    /// Remaining argument text joined with single spaces, for free-text verbs.
    #[must_use]
    pub fn joined_args(&self) -> String {
        self.args.join(" ")
    }
}

/// Splits raw command text into a [`ParsedCommand`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tokenizer {
    marker: String,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(DEFAULT_MARKER)
    }
}

impl Tokenizer {
    #[must_use]
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    #[must_use]
    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Whether `raw` starts with the command marker (after leading whitespace).
    #[must_use]
    pub fn is_command(&self, raw: &str) -> bool {
        raw.trim_start().starts_with(self.marker.as_str())
    }

    /// Lowercase verb keyword, without tokenizing the arguments.
    #[must_use]
    pub fn peek_verb(&self, raw: &str) -> Option<String> {
        let body = raw.trim_start().strip_prefix(self.marker.as_str())?;
        body.split_whitespace()
            .next()
            .filter(|_| !body.starts_with(char::is_whitespace))
            .map(str::to_lowercase)
    }

    /// Tokenize `raw` into verb and arguments.
    ///
    /// Double-quoted spans become part of a single argument and the quote
    /// characters are consumed. There are no escape sequences. Empty
    /// arguments (such as `""`) are dropped.
    ///
    /// # Errors
    ///
    /// - [`ParseError::MissingMarker`] when `raw` does not start with the marker
    /// - [`ParseError::MissingVerb`] when nothing follows the marker
    /// - [`ParseError::UnterminatedQuote`] when a quote is never closed
    pub fn tokenize(&self, raw: &str) -> Result<ParsedCommand, ParseError> {
        let trimmed = raw.trim_start();
        let offset = raw.len() - trimmed.len();
        let Some(body) = trimmed.strip_prefix(self.marker.as_str()) else {
            return Err(ParseError::MissingMarker {
                marker: self.marker.clone(),
            });
        };
        if body.is_empty() || body.starts_with(char::is_whitespace) {
            return Err(ParseError::MissingVerb);
        }

        let verb_end = body.find(char::is_whitespace).unwrap_or(body.len());
        let verb = body[..verb_end].to_lowercase();
        if verb.contains(QUOTE) {
            return Err(ParseError::MissingVerb);
        }

        let rest = &body[verb_end..];
        let rest_offset = offset + self.marker.len() + verb_end;
        let (args, quoted) = split_arguments(rest, rest_offset)?;

        Ok(ParsedCommand { verb, args, quoted })
    }
}

/// Split argument text honouring double-quoted spans.
///
/// `base` is the byte offset of `text` within the original input, used to
/// report the position of an unterminated quote.
fn split_arguments(text: &str, base: usize) -> Result<(Vec<String>, Vec<bool>), ParseError> {
    let mut args = Vec::new();
    let mut quoted = Vec::new();
    let mut current = String::new();
    let mut current_quoted = false;
    let mut open_quote: Option<usize> = None;

    let mut flush = |current: &mut String, current_quoted: &mut bool| {
        if !current.is_empty() {
            args.push(std::mem::take(current));
            quoted.push(*current_quoted);
        }
        *current_quoted = false;
    };

    for (idx, ch) in text.char_indices() {
        match (ch, open_quote) {
            (QUOTE, None) => {
                open_quote = Some(base + idx);
                current_quoted = true;
            }
            (QUOTE, Some(_)) => open_quote = None,
            (c, None) if c.is_whitespace() => flush(&mut current, &mut current_quoted),
            (c, _) => current.push(c),
        }
    }

    if let Some(position) = open_quote {
        return Err(ParseError::UnterminatedQuote { position });
    }
    flush(&mut current, &mut current_quoted);

    Ok((args, quoted))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(raw: &str) -> Result<ParsedCommand, ParseError> {
        Tokenizer::default().tokenize(raw)
    }

    #[test]
    fn should_split_quoted_and_bare_arguments() {
        let cmd = tokenize(r#"/turnon "Living Room Light" light.bedroom"#).unwrap();
        assert_eq!(cmd.verb, "turnon");
        assert_eq!(cmd.args, vec!["Living Room Light", "light.bedroom"]);
        assert_eq!(cmd.quoted, vec![true, false]);
    }

    #[test]
    fn should_reject_unterminated_quote() {
        let result = tokenize(r#"/turnon "Living Room"#);
        assert_eq!(result, Err(ParseError::UnterminatedQuote { position: 8 }));
    }

    #[test]
    fn should_lowercase_verb() {
        let cmd = tokenize("/TurnOff fan").unwrap();
        assert_eq!(cmd.verb, "turnoff");
        assert_eq!(cmd.args, vec!["fan"]);
    }

    #[test]
    fn should_accept_zero_argument_verb() {
        let cmd = tokenize("/light").unwrap();
        assert_eq!(cmd.verb, "light");
        assert!(cmd.args.is_empty());
        assert!(cmd.quoted.is_empty());
    }

    #[test]
    fn should_preserve_argument_order() {
        let cmd = tokenize("/toggle c a b").unwrap();
        assert_eq!(cmd.args, vec!["c", "a", "b"]);
    }

    #[test]
    fn should_collapse_repeated_whitespace() {
        let cmd = tokenize("/turnon   a \t  b  ").unwrap();
        assert_eq!(cmd.args, vec!["a", "b"]);
    }

    #[test]
    fn should_join_quoted_span_with_adjacent_text() {
        let cmd = tokenize(r#"/turnon ab"c d"e f"#).unwrap();
        assert_eq!(cmd.args, vec!["abc de", "f"]);
        assert_eq!(cmd.quoted, vec![true, false]);
    }

    #[test]
    fn should_drop_empty_quoted_argument() {
        let cmd = tokenize(r#"/turnon "" lamp"#).unwrap();
        assert_eq!(cmd.args, vec!["lamp"]);
    }

    #[test]
    fn should_not_treat_single_quote_as_delimiter() {
        let cmd = tokenize("/search it's").unwrap();
        assert_eq!(cmd.args, vec!["it's"]);
    }

    #[test]
    fn should_keep_unicode_arguments() {
        let cmd = tokenize(r#"/climate 客厅空调 制冷 26"#).unwrap();
        assert_eq!(cmd.args, vec!["客厅空调", "制冷", "26"]);
    }

    #[test]
    fn should_report_missing_marker() {
        let result = tokenize("turnon lamp");
        assert!(matches!(result, Err(ParseError::MissingMarker { .. })));
    }

    #[test]
    fn should_report_missing_verb() {
        assert_eq!(tokenize("/"), Err(ParseError::MissingVerb));
        assert_eq!(tokenize("/ turnon"), Err(ParseError::MissingVerb));
    }

    #[test]
    fn should_honour_custom_marker() {
        let tokenizer = Tokenizer::new("!");
        let cmd = tokenizer.tokenize("!help").unwrap();
        assert_eq!(cmd.verb, "help");
        assert!(!tokenizer.is_command("/help"));
    }

    #[test]
    fn should_peek_verb_without_parsing_arguments() {
        let tokenizer = Tokenizer::default();
        assert_eq!(
            tokenizer.peek_verb(r#"/TurnOn "unterminated"#).as_deref(),
            Some("turnon")
        );
        assert_eq!(tokenizer.peek_verb("hello"), None);
    }

    #[test]
    fn should_parse_known_verbs_case_insensitively() {
        assert_eq!("TURNON".parse::<Verb>(), Ok(Verb::TurnOn));
        assert!("dance".parse::<Verb>().is_err());
    }

    #[test]
    fn should_classify_verbs() {
        assert!(Verb::TurnOff.is_mutating());
        assert!(Verb::Climate.is_mutating());
        assert!(!Verb::Light.requires_permission());
        assert!(Verb::Refresh.requires_permission());
        assert!(!Verb::Refresh.is_mutating());
    }

    #[test]
    fn should_map_switch_services() {
        assert_eq!(Verb::TurnOn.switch_service(), Some("turn_on"));
        assert_eq!(Verb::Toggle.switch_service(), Some("toggle"));
        assert_eq!(Verb::Climate.switch_service(), None);
    }
}
