//! Parsing of console input lines into commands.
//!
//! Arguments are double-quoted; inside quotes `\"` is a literal quote and
//! `\\` a literal backslash. Every argument must be separated from what comes
//! before it by whitespace.

/// A user intent parsed from one console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/away ["message"]`
    Away {
        /// Away message, if given
        message: Option<String>,
    },
    /// `/help`
    Help,
    /// `/list`
    List,
    /// `/invite "nick"`
    Invite {
        /// Nickname of the invitee
        nickname: String,
    },
    /// `/names ["channel"]`
    Names {
        /// Channel to filter on
        channel: Option<String>,
    },
    /// `/msg ["target"] "text"`
    Msg {
        /// Channel or nickname; the current channel when absent
        target: Option<String>,
        /// Message text
        text: String,
    },
    /// `/join "channel" ["key"]`
    Join {
        /// Channel to join or create
        channel: String,
        /// Key to present or to protect a new channel with
        key: Option<String>,
    },
    /// `/exit`
    Exit,
    /// Anything else
    Invalid,
}

/// Parse one console line
pub fn parse(line: &str) -> Command {
    let Some(rest) = line.trim().strip_prefix('/') else {
        return Command::Invalid;
    };
    let name_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    let (name, tail) = rest.split_at(name_end);
    let Some(args) = quoted_args(tail) else {
        return Command::Invalid;
    };

    match (name, args.as_slice()) {
        ("away", []) => Command::Away { message: None },
        ("away", [message]) => Command::Away {
            message: Some(message.clone()),
        },
        ("help", []) => Command::Help,
        ("list", []) => Command::List,
        ("exit", []) => Command::Exit,
        ("invite", [nickname]) => Command::Invite {
            nickname: nickname.clone(),
        },
        ("names", []) => Command::Names { channel: None },
        ("names", [channel]) => Command::Names {
            channel: Some(channel.clone()),
        },
        ("msg", [text]) => Command::Msg {
            target: None,
            text: text.clone(),
        },
        ("msg", [target, text]) => Command::Msg {
            target: Some(target.clone()),
            text: text.clone(),
        },
        ("join", [channel]) => Command::Join {
            channel: channel.clone(),
            key: None,
        },
        ("join", [channel, key]) => Command::Join {
            channel: channel.clone(),
            key: Some(key.clone()),
        },
        _ => Command::Invalid,
    }
}

/// Split `tail` into whitespace-separated quoted arguments
fn quoted_args(tail: &str) -> Option<Vec<String>> {
    let mut args = Vec::new();
    let mut chars = tail.chars().peekable();

    loop {
        match chars.peek() {
            None => return Some(args),
            Some(c) if c.is_whitespace() => {}
            Some(_) => return None,
        }
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        match chars.next() {
            None => return Some(args),
            Some('"') => {}
            Some(_) => return None,
        }

        let mut arg = String::new();
        loop {
            match chars.next()? {
                '\\' => arg.push(chars.next()?),
                '"' => break,
                c => arg.push(c),
            }
        }
        args.push(arg);
    }
}
