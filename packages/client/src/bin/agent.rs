//! Support agent console for the CRM real-time core.
//!
//! Keeps the notification feed connected for the logged-in user and, in agent
//! mode, lets the user claim and chat in support sessions. Commands are read
//! with rustyline; type `/help` for the list.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin crm-live-agent -- --user-id 42 --agent
//! CRM_SESSION_COOKIE="session=..." cargo run --bin crm-live-agent -- -u 42 -a http://127.0.0.1:8000
//! ```

use std::sync::Arc;

use clap::Parser;
use rustyline::{DefaultEditor, error::ReadlineError};
use tokio::sync::mpsc;

use crm_live_client::{
    ChatSessionCoordinator, ChatUpdate, LiveConfig, NotificationChannel, NotificationUpdate,
    domain::{SessionId, UserId},
    infrastructure::{
        HttpSupportApi, SupportApi,
        dto::http::TicketUpdate,
    },
    ui::{Command, HELP, MessageFormatter, redisplay_prompt},
};
use crm_live_shared::{
    logger::setup_logger,
    time::{Clock, SystemClock},
};

#[derive(Parser, Debug)]
#[command(name = "crm-live-agent")]
#[command(about = "CRM notification feed and live support chat console", long_about = None)]
struct Args {
    /// Logged-in user id
    #[arg(short = 'u', long)]
    user_id: String,

    /// Base URL of the CRM REST API
    #[arg(short = 'a', long, default_value = "http://127.0.0.1:8000")]
    api_url: String,

    /// WebSocket base URL (derived from --api-url when omitted)
    #[arg(long)]
    ws_url: Option<String>,

    /// Act as a support agent (enables chat sessions and dashboard commands)
    #[arg(long, default_value_t = false)]
    agent: bool,

    /// Session cookie sent with every request
    #[arg(long, env = "CRM_SESSION_COOKIE")]
    cookie: Option<String>,
}

#[tokio::main]
async fn main() {
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();

    if let Err(e) = run(args).await {
        tracing::error!("Agent console error: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = LiveConfig::new(&args.api_url)?;
    if let Some(ws_url) = &args.ws_url {
        config = config.with_ws_base_url(ws_url)?;
    }
    if let Some(cookie) = args.cookie {
        config = config.with_credential(cookie);
    }
    let user_id = UserId::new(args.user_id)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let api: Arc<dyn SupportApi> = Arc::new(HttpSupportApi::new(&config, Arc::clone(&clock))?);

    let notifications =
        NotificationChannel::connect_with_clock(&config, user_id.clone(), Arc::clone(&clock)).await;
    let coordinator =
        ChatSessionCoordinator::with_clock(config, Arc::clone(&api), user_id.clone(), clock);

    println!(
        "\nYou are '{}'{}. Type /help for commands. Press Ctrl+C to exit.\n",
        user_id,
        if args.agent { " (agent)" } else { "" }
    );

    let input_rx = spawn_readline(user_id.to_string());
    let mut console = Console {
        user_id,
        is_agent: args.agent,
        api,
        notifications,
        coordinator,
    };
    console.run(input_rx).await;
    console.shutdown().await;
    Ok(())
}

/// Read lines on a blocking thread and forward them to the async side
fn spawn_readline(prompt_user: String) -> mpsc::UnboundedReceiver<String> {
    let (input_tx, input_rx) = mpsc::unbounded_channel::<String>();

    std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                eprintln!("Failed to initialize readline: {}", e);
                return;
            }
        };

        let prompt = format!("{}> ", prompt_user);

        loop {
            match rl.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        rl.add_history_entry(line).ok();
                        if input_tx.send(line.to_string()).is_err() {
                            break;
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    tracing::info!("Interrupted");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    tracing::info!("EOF");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {}", err);
                    break;
                }
            }
        }
    });

    input_rx
}

struct Console {
    user_id: UserId,
    is_agent: bool,
    api: Arc<dyn SupportApi>,
    notifications: NotificationChannel,
    coordinator: ChatSessionCoordinator,
}

impl Console {
    async fn run(&mut self, mut input_rx: mpsc::UnboundedReceiver<String>) {
        loop {
            tokio::select! {
                line = input_rx.recv() => {
                    let Some(line) = line else { break };
                    if !self.handle_line(&line).await {
                        break;
                    }
                }
                Some(update) = self.notifications.next_update() => {
                    self.show_notification_update(update);
                    redisplay_prompt(self.user_id.as_str());
                }
                Some(update) = self.coordinator.next_update() => {
                    self.show_chat_update(update);
                    redisplay_prompt(self.user_id.as_str());
                }
            }
        }
    }

    async fn shutdown(&mut self) {
        self.coordinator.shutdown().await;
        self.notifications.shutdown().await;
    }

    /// Returns `false` when the console should exit.
    async fn handle_line(&mut self, line: &str) -> bool {
        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(e) => {
                toast(&e.to_string());
                return true;
            }
        };

        match command {
            Command::Quit => return false,
            Command::Help => println!("{}", HELP),
            Command::Notifications => {
                println!("{}", MessageFormatter::format_feed(self.notifications.feed()));
            }
            Command::Read(local_id) => {
                if !self.notifications.mark_read(&local_id) {
                    toast(&format!("No notification '{}'", local_id));
                }
            }
            Command::ReadAll => self.notifications.mark_all_read(),
            Command::Clear => self.notifications.clear_all(),
            other if !self.is_agent => {
                tracing::debug!("Rejected agent command {:?}", other);
                toast("This command is only available in agent mode (--agent)");
            }
            Command::Sessions => self.list_sessions().await,
            Command::Open(id) => self.open_session(&id).await,
            Command::Close => self.close_session().await,
            Command::History => self.reload_history().await,
            Command::Say(text) => self.say(&text),
            Command::Stats => match self.api.stats().await {
                Ok(stats) => println!("{}", MessageFormatter::format_stats(&stats)),
                Err(e) => toast(&e.toast_message()),
            },
            Command::Tickets(status) => match self.api.tickets(status).await {
                Ok(tickets) => println!("{}", MessageFormatter::format_tickets(&tickets)),
                Err(e) => toast(&e.toast_message()),
            },
            Command::Advance(ticket_id) => self.advance_ticket(&ticket_id).await,
            Command::Subscriptions => match self.api.subscriptions().await {
                Ok(subs) => println!("{}", MessageFormatter::format_subscriptions(&subs)),
                Err(e) => toast(&e.toast_message()),
            },
            Command::Overdue(id) => match self.api.send_overdue_email(&id).await {
                Ok(()) => println!("Overdue email sent for subscription {}", id),
                Err(e) => toast(&e.toast_message()),
            },
            Command::SubscriptionStatus { id, status } => {
                match self.api.update_subscription_status(&id, &status).await {
                    Ok(()) => println!("Subscription {} is now {}", id, status),
                    Err(e) => toast(&e.toast_message()),
                }
            }
        }
        true
    }

    async fn list_sessions(&mut self) {
        match self.coordinator.list_active().await {
            Ok(sessions) => println!(
                "{}",
                MessageFormatter::format_sessions(sessions, &self.user_id)
            ),
            Err(e) => toast(&e.toast_message()),
        }
    }

    async fn open_session(&mut self, id: &str) {
        let session_id = match SessionId::new(id) {
            Ok(session_id) => session_id,
            Err(e) => return toast(&e.to_string()),
        };
        if self.coordinator.find_session(&session_id).is_none()
            && let Err(e) = self.coordinator.list_active().await
        {
            return toast(&e.toast_message());
        }
        let Some(session) = self.coordinator.find_session(&session_id).cloned() else {
            return toast(&format!("No active session '{}'", session_id));
        };

        match self.coordinator.select(&session).await {
            Ok(channel) => println!(
                "{}",
                MessageFormatter::format_transcript(channel.transcript(), &self.user_id)
            ),
            Err(e) => toast(&e.toast_message()),
        }
    }

    async fn close_session(&mut self) {
        let Some(session_id) = self
            .coordinator
            .active()
            .map(|channel| channel.session_id().clone())
        else {
            return toast("No open session");
        };
        match self.coordinator.close(&session_id).await {
            Ok(()) => println!("Session {} closed", session_id),
            Err(e) => toast(&e.toast_message()),
        }
    }

    async fn reload_history(&mut self) {
        let Some(channel) = self.coordinator.active_mut() else {
            return toast("No open session");
        };
        match channel.reload_history().await {
            Ok(()) => println!(
                "{}",
                MessageFormatter::format_transcript(channel.transcript(), &self.user_id)
            ),
            Err(e) => toast(&e.toast_message()),
        }
    }

    fn say(&mut self, text: &str) {
        let Some(channel) = self.coordinator.active_mut() else {
            return toast("Open a session first (/sessions, /open <id>)");
        };
        match channel.send_message(text) {
            Ok(message) => println!(
                "{}",
                MessageFormatter::format_chat_message(message, &self.user_id)
            ),
            Err(e) => toast(&e.to_string()),
        }
    }

    async fn advance_ticket(&self, ticket_id: &str) {
        let tickets = match self.api.tickets(None).await {
            Ok(tickets) => tickets,
            Err(e) => return toast(&e.toast_message()),
        };
        let Some(ticket) = tickets.into_iter().find(|t| t.id == ticket_id) else {
            return toast(&format!("No ticket '{}'", ticket_id));
        };
        let Some(next) = ticket.status.next() else {
            return toast(&format!("Ticket {} is already {}", ticket.id, ticket.status));
        };

        let update = TicketUpdate {
            status: next,
            resolution: None,
        };
        match self.api.update_ticket(&ticket.id, &update).await {
            Ok(()) => println!("Ticket {}: {} -> {}", ticket.id, ticket.status, next),
            Err(e) => toast(&e.toast_message()),
        }
    }

    fn show_notification_update(&self, update: NotificationUpdate) {
        match update {
            NotificationUpdate::Connected => {
                println!("{}", MessageFormatter::format_connected("notifications"));
            }
            NotificationUpdate::Disconnected { reconnect_in } => println!(
                "{}",
                MessageFormatter::format_disconnected("notifications", reconnect_in)
            ),
            NotificationUpdate::Received(event) => println!(
                "{}",
                MessageFormatter::format_notification(&event, self.notifications.unread_count())
            ),
        }
    }

    fn show_chat_update(&self, update: ChatUpdate) {
        let channel_name = match self.coordinator.active() {
            Some(channel) => format!("chat {}", channel.session_id()),
            None => "chat".to_string(),
        };
        match update {
            ChatUpdate::Connected => {
                println!("{}", MessageFormatter::format_connected(&channel_name));
            }
            ChatUpdate::Disconnected { reconnect_in } => println!(
                "{}",
                MessageFormatter::format_disconnected(&channel_name, reconnect_in)
            ),
            ChatUpdate::Appended(message) => println!(
                "\n{}",
                MessageFormatter::format_chat_message(&message, &self.user_id)
            ),
            ChatUpdate::Confirmed(message) => {
                println!("\n{}", MessageFormatter::format_delivered(&message));
            }
            ChatUpdate::PersistFailed { error, .. } => toast(&error.toast_message()),
        }
    }
}

fn toast(message: &str) {
    println!("{}", MessageFormatter::format_toast(message));
}
