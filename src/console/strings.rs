//! Localized display text.
//!
//! Every line the node shows to its user is a [`Text`] value rendered by
//! [`Strings`] in the configured [`Lang`].

use crate::utils::{CommandError, ConfigError, NodeError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Display language
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    /// English
    #[default]
    En,
    /// French
    Fr,
}

impl fmt::Display for Lang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::En => f.write_str("en"),
            Self::Fr => f.write_str("fr"),
        }
    }
}

impl FromStr for Lang {
    type Err = NodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Self::En),
            "fr" => Ok(Self::Fr),
            other => Err(ConfigError::InvalidValue {
                field: "node.language".to_string(),
                value: other.to_string(),
            }
            .into()),
        }
    }
}

/// A displayable message and its arguments
#[derive(Debug, Clone, Copy)]
pub enum Text<'a> {
    /// Startup banner
    Listening { address: &'a str },
    /// Command reference
    Help,
    /// Unparseable input
    InvalidCommand,
    /// Default away message
    UserAbsent,
    /// Away toggled
    AwayStatus { away: bool, message: Option<&'a str> },
    /// Invitation delivered to this node
    InviteReceived {
        from: &'a str,
        channel: &'a str,
        key: Option<&'a str>,
    },
    /// Reply to `/list`
    ChannelList { channels: &'a [String] },
    /// Reply to `/names`
    Names {
        channel: Option<&'a str>,
        names: &'a [String],
    },
    /// Channel joined
    Joined {
        channel: &'a str,
        key: Option<&'a str>,
        created: bool,
    },
    /// A peer left the mesh
    UserClosed { nickname: &'a str },
    /// Incoming channel message
    ChannelLine {
        channel: &'a str,
        sender: &'a str,
        text: &'a str,
    },
    /// Incoming private message
    PrivateLine { sender: &'a str, text: &'a str },
    /// The recipient of a private message is away
    PeerAway { nickname: &'a str, message: &'a str },
    /// Shown on `/exit`
    Goodbye,
}

const HELP_EN: &str = r#"/away "{message}"                   Signals our absence when we are sent a private message.
                                    A new /away command reactivates the user.
/help                               Displays the list of available commands.
/invite "{nick}"                    Invites a user to the current channel.
/join "{channel}" "{key}"           Joins a channel (possibly protected by a key).
                                    The channel is created if it does not exist.
/list                               Displays the list of channels.
/msg "{channel|nick}" "{message}"   Sends a message to a user or to a channel
                                    (whether present in said channel or not).
                                    The channel or nick argument is optional.
/names "{channel}"                  Displays users in a channel. Without a channel,
                                    displays all users of all channels.
/exit                               Leaves the network properly."#;

const HELP_FR: &str = r#"/away "{message}"                   Signale son absence quand on nous envoie un message privé.
                                    Une nouvelle commande /away réactive l'utilisateur.
/help                               Affiche la liste des commandes disponibles.
/invite "{nick}"                    Invite un utilisateur sur le canal où on se trouve.
/join "{canal}" "{clé}"             Permet de rejoindre un canal (protégé éventuellement par une clé).
                                    Le canal est créé s'il n'existe pas.
/list                               Affiche la liste des canaux.
/msg "{canal|nick}" "{message}"     Envoie un message à un utilisateur ou sur un canal
                                    (où on est présent ou pas).
                                    Les arguments canal ou nick sont optionnels.
/names "{canal}"                    Affiche les utilisateurs d'un canal. Sans canal,
                                    affiche tous les utilisateurs de tous les canaux.
/exit                               Quitte le réseau proprement."#;

/// Renders [`Text`] in one language
#[derive(Debug, Clone, Copy, Default)]
pub struct Strings {
    lang: Lang,
}

impl Strings {
    /// Create a renderer for a language
    pub fn new(lang: Lang) -> Self {
        Self { lang }
    }

    /// Render a message
    pub fn render(&self, text: &Text<'_>) -> String {
        let fr = self.lang == Lang::Fr;
        match *text {
            Text::Listening { address } => {
                if fr {
                    format!("Le nœud est opérationnel et écoute sur {address} !")
                } else {
                    format!("The node is operational and listening on {address} !")
                }
            }
            Text::Help => pick(fr, HELP_FR, HELP_EN),
            Text::InvalidCommand => pick(
                fr,
                "La commande que vous avez saisie n'est pas valide.",
                "The command you entered is invalid.",
            ),
            Text::UserAbsent => pick(
                fr,
                "Je suis absent à ce moment, je vous répondrai après mon retour.",
                "I am absent at the moment. I will reply after I get back.",
            ),
            Text::AwayStatus { away, message } => {
                let message = message.unwrap_or_default();
                match (fr, away) {
                    (true, true) => format!(
                        "Vous êtes désormais marqué comme absent. Votre message d'absence est : \"{message}\"."
                    ),
                    (true, false) => "Vous êtes désormais marqué comme présent.".to_string(),
                    (false, true) => format!(
                        "You are now marked as away. Your away message is : \"{message}\"."
                    ),
                    (false, false) => "You are now marked as present.".to_string(),
                }
            }
            Text::InviteReceived { from, channel, key } => match (fr, key) {
                (true, Some(key)) => {
                    format!("\"{from}\" vous a invité au canal \"{channel}\". Clé : \"{key}\"")
                }
                (true, None) => format!("\"{from}\" vous a invité au canal \"{channel}\"."),
                (false, Some(key)) => {
                    format!("\"{from}\" invited you to the channel \"{channel}\". Key : \"{key}\"")
                }
                (false, None) => format!("\"{from}\" invited you to the channel \"{channel}\"."),
            },
            Text::ChannelList { channels } => {
                let title = if fr { "Liste des canaux :" } else { "List of channels :" };
                bullet_list(title, channels)
            }
            Text::Names { channel, names } => {
                let title = match (fr, channel) {
                    (true, Some(channel)) => {
                        format!("Liste des utilisateurs dans le canal \"{channel}\" :")
                    }
                    (true, None) => "Liste de tous les utilisateurs :".to_string(),
                    (false, Some(channel)) => format!("List of users in the channel \"{channel}\" :"),
                    (false, None) => "List of all users :".to_string(),
                };
                bullet_list(&title, names)
            }
            Text::Joined {
                channel,
                key,
                created,
            } => {
                let key_msg = match (fr, key) {
                    (_, None) => String::new(),
                    (true, Some(key)) => format!(" Clé : \"{key}\""),
                    (false, Some(key)) => format!(" Key : \"{key}\""),
                };
                match (fr, created) {
                    (true, true) => {
                        format!("Vous avez créé et rejoint avec succès le canal {channel}.{key_msg}")
                    }
                    (true, false) => format!("Vous avez rejoint avec succès le canal {channel}."),
                    (false, true) => format!(
                        "You have successfully created and joined the channel {channel}.{key_msg}"
                    ),
                    (false, false) => format!("You have successfully joined the channel {channel}."),
                }
            }
            Text::UserClosed { nickname } => {
                if fr {
                    format!("\"{nickname}\" a fermé la connexion.")
                } else {
                    format!("\"{nickname}\" has closed the connection.")
                }
            }
            Text::ChannelLine {
                channel,
                sender,
                text,
            } => format!("[{channel}] {sender} : {text}"),
            Text::PrivateLine { sender, text } => format!("{sender} : {text}"),
            Text::PeerAway { nickname, message } => {
                if fr {
                    format!("\"{nickname}\" est absent : {message}")
                } else {
                    format!("\"{nickname}\" is away : {message}")
                }
            }
            Text::Goodbye => pick(fr, "Fermeture des connexions.", "Closing connections."),
        }
    }

    /// Render a command error as a console line
    pub fn command_error(&self, error: &CommandError) -> String {
        let fr = self.lang == Lang::Fr;
        match error {
            CommandError::UnknownNickname { .. } => {
                pick(fr, "Cet utilisateur n'existe pas.", "This user doesn't exist.")
            }
            CommandError::UnknownChannel { .. } => {
                pick(fr, "Ce canal n'existe pas.", "This channel doesn't exist.")
            }
            CommandError::UnknownTarget { .. } => pick(
                fr,
                "Cet utilisateur ou canal n'existe pas.",
                "This user or channel doesn't exist.",
            ),
            CommandError::IncorrectKey { .. } => {
                pick(fr, "La clé entrée est incorrecte.", "The input key is incorrect.")
            }
        }
    }
}

fn pick(fr: bool, french: &str, english: &str) -> String {
    let text = if fr { french } else { english };
    text.to_string()
}

fn bullet_list(title: &str, items: &[String]) -> String {
    std::iter::once(title.to_string())
        .chain(items.iter().map(|item| format!("- {item}")))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lang_parsing() {
        assert_eq!("FR".parse::<Lang>().unwrap(), Lang::Fr);
        assert_eq!("en".parse::<Lang>().unwrap(), Lang::En);
        assert!("de".parse::<Lang>().is_err());
    }

    #[test]
    fn test_lists() {
        let strings = Strings::new(Lang::En);
        let channels = vec!["default".to_string(), "rust".to_string()];
        assert_eq!(
            strings.render(&Text::ChannelList { channels: &channels }),
            "List of channels :\n- default\n- rust"
        );
        assert_eq!(
            strings.render(&Text::Names {
                channel: Some("rust"),
                names: &[]
            }),
            "List of users in the channel \"rust\" :"
        );
    }

    #[test]
    fn test_languages_differ() {
        let en = Strings::new(Lang::En);
        let fr = Strings::new(Lang::Fr);
        let error = CommandError::IncorrectKey {
            channel: "rust".to_string(),
        };
        assert_eq!(en.command_error(&error), "The input key is incorrect.");
        assert_ne!(en.command_error(&error), fr.command_error(&error));
        assert_ne!(en.render(&Text::Help), fr.render(&Text::Help));
    }

    #[test]
    fn test_message_lines() {
        let strings = Strings::default();
        assert_eq!(
            strings.render(&Text::ChannelLine {
                channel: "rust",
                sender: "alice",
                text: "hi"
            }),
            "[rust] alice : hi"
        );
        assert!(strings
            .render(&Text::InviteReceived {
                from: "alice",
                channel: "rust",
                key: Some("k")
            })
            .contains("Key : \"k\""));
    }
}
