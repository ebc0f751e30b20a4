//! Line-oriented command dispatch.
//!
//! Messaging-platform adapters are out of scope; this shim parses
//! `<command> [prompt…]` lines the way a platform dispatcher would and
//! routes them to the handlers.

/// A parsed command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation<'a> {
    /// The configured chat command, with an optional prompt
    Chat { prompt: Option<&'a str> },
    /// The standalone imagine command
    Imagine { prompt: Option<&'a str> },
    /// Anything else
    Unknown,
}

/// Name of the standalone text-to-image command.
pub const IMAGINE_COMMAND: &str = "imagine";

/// Parse one input line into an invocation.
pub fn parse_line<'a>(
    line: &'a str,
    chat_command: &str,
    imagine_enabled: bool,
) -> Invocation<'a> {
    let trimmed = line.trim();
    let (head, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (trimmed, ""),
    };
    let prompt = (!rest.is_empty()).then_some(rest);

    if head == chat_command {
        Invocation::Chat { prompt }
    } else if imagine_enabled && head == IMAGINE_COMMAND {
        Invocation::Imagine { prompt }
    } else {
        Invocation::Unknown
    }
}
