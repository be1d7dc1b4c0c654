//! Console command parsing.

use thiserror::Error;

use crate::domain::TicketStatus;

/// One line of console input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Sessions,
    Open(String),
    Close,
    History,
    Notifications,
    Read(String),
    ReadAll,
    Clear,
    Stats,
    Tickets(Option<TicketStatus>),
    Advance(String),
    Subscriptions,
    Overdue(String),
    SubscriptionStatus { id: String, status: String },
    Help,
    Quit,
    /// Plain text for the open chat
    Say(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Unknown command '/{0}'. Type /help for the list of commands.")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("{0}")]
    InvalidArgument(String),
}

pub const HELP: &str = "\
/sessions                 list active chat sessions
/open <session-id>        claim (if needed) and open a session
/close                    close the open session
/history                  reload the open session's transcript
/notifications            show the notification feed
/read <local-id>          mark one notification as read
/readall                  mark every notification as read
/clear                    clear the notification feed
/stats                    show support dashboard counters
/tickets [status]         list tickets, optionally filtered by status
/advance <ticket-id>      move a ticket to its next status
/subs                     list subscriptions
/overdue <sub-id>         send the overdue payment email
/substatus <sub-id> <st>  set a subscription status
/help                     show this help
/quit                     exit
anything else             send to the open chat";

impl Command {
    /// Parse one trimmed input line.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let line = line.trim();
        let Some(rest) = line.strip_prefix('/') else {
            return Ok(Self::Say(line.to_string()));
        };
        let (name, argument) = match rest.split_once(char::is_whitespace) {
            Some((name, argument)) => (name, argument.trim()),
            None => (rest, ""),
        };

        match name {
            "sessions" => Ok(Self::Sessions),
            "open" => required(argument, "/open <session-id>").map(Self::Open),
            "close" => Ok(Self::Close),
            "history" => Ok(Self::History),
            "notifications" => Ok(Self::Notifications),
            "read" => required(argument, "/read <local-id>").map(Self::Read),
            "readall" => Ok(Self::ReadAll),
            "clear" => Ok(Self::Clear),
            "stats" => Ok(Self::Stats),
            "tickets" if argument.is_empty() => Ok(Self::Tickets(None)),
            "tickets" => argument
                .parse::<TicketStatus>()
                .map(|status| Self::Tickets(Some(status)))
                .map_err(CommandError::InvalidArgument),
            "advance" => required(argument, "/advance <ticket-id>").map(Self::Advance),
            "subs" => Ok(Self::Subscriptions),
            "overdue" => required(argument, "/overdue <subscription-id>").map(Self::Overdue),
            "substatus" => match argument.split_once(char::is_whitespace) {
                Some((id, status)) if !status.trim().is_empty() => Ok(Self::SubscriptionStatus {
                    id: id.to_string(),
                    status: status.trim().to_string(),
                }),
                _ => Err(CommandError::Usage("/substatus <subscription-id> <status>")),
            },
            "help" => Ok(Self::Help),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

fn required(argument: &str, usage: &'static str) -> Result<String, CommandError> {
    if argument.is_empty() {
        Err(CommandError::Usage(usage))
    } else {
        Ok(argument.to_string())
    }
}
