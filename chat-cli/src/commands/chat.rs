//! Interactive chat.
//!
//! Reads lines from stdin and prints group activity to stdout. Lines starting
//! with `/` are commands; everything else is sent as chat.

use anyhow::{Context, Result};
use chat_client::{ChatSession, MulticastTransport, SessionConfig, SessionEvent, Transport};
use chat_types::MemberName;
use std::future::Future;
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::config::Profile;

const HELP: &str = "Commands: /who (list members), /sync (ask for the member list), /quit";

/// One line of user input.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Empty,
    Chat(&'a str),
    Who,
    Sync,
    Help,
    Quit,
    Unknown(&'a str),
}

/// Run the chat command.
pub async fn run(data_dir: &Path, name: Option<&str>, config: &SessionConfig) -> Result<()> {
    let local = resolve_name(data_dir, name).await?;

    let transport =
        MulticastTransport::bind(config.group, config.port, config.multicast_options())
            .with_context(|| format!("Failed to join {}:{}", config.group, config.port))?;
    let (session, mut events) =
        ChatSession::start(local.clone(), transport, config.session_options());

    session.join().await.context("Failed to announce presence")?;
    println!(
        "Joined {}:{} as {}. {}",
        config.group, config.port, local, HELP
    );

    let stdin = BufReader::new(tokio::io::stdin());
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Ctrl+C handler unavailable: {}", e);
            std::future::pending::<()>().await;
        }
    };
    let mut stdout = std::io::stdout();

    let outcome = drive(&session, &mut events, stdin, ctrl_c, &mut stdout).await;
    let left = session.leave().await;

    outcome?;
    left.context("Failed to leave cleanly")?;
    println!("Disconnected.");
    Ok(())
}

async fn resolve_name(data_dir: &Path, name: Option<&str>) -> Result<MemberName> {
    match name {
        Some(name) => MemberName::new(name).context("Invalid --name"),
        None => Profile::load(data_dir).await?.member_name(),
    }
}

/// Pump input lines and session events until quit, end of input, shutdown
/// or a transport failure.
async fn drive<T, R, S, W>(
    session: &ChatSession<T>,
    events: &mut UnboundedReceiver<SessionEvent>,
    input: R,
    shutdown: S,
    out: &mut W,
) -> Result<()>
where
    T: Transport + 'static,
    R: AsyncBufRead + Unpin,
    S: Future<Output = ()>,
    W: Write,
{
    let local = session.local().await;
    let mut lines = input.lines();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                writeln!(out)?;
                break;
            }
            event = events.recv() => match event {
                Some(SessionEvent::TransportFailed { error }) => {
                    anyhow::bail!("Network failure: {}", error);
                }
                Some(SessionEvent::Closed) | None => break,
                Some(event) => {
                    for line in render_event(&event, &local) {
                        writeln!(out, "{}", line)?;
                    }
                }
            },
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read input")? else {
                    break;
                };
                match parse_input(&line) {
                    Input::Empty => {}
                    Input::Chat(text) => session.send_chat(text).await.context("Failed to send")?,
                    Input::Who => writeln!(out, "{}", format_members(&session.members().await))?,
                    Input::Sync => session
                        .request_member_list()
                        .await
                        .context("Failed to request member list")?,
                    Input::Help => writeln!(out, "{}", HELP)?,
                    Input::Quit => break,
                    Input::Unknown(command) => {
                        writeln!(out, "Unknown command: {} (try /help)", command)?
                    }
                }
            }
        }
        out.flush()?;
    }

    out.flush()?;
    Ok(())
}

fn parse_input(line: &str) -> Input<'_> {
    if line.trim().is_empty() {
        return Input::Empty;
    }
    if !line.starts_with('/') {
        return Input::Chat(line);
    }

    let command = line.split_whitespace().next().unwrap_or(line);
    match command {
        "/who" => Input::Who,
        "/sync" => Input::Sync,
        "/help" => Input::Help,
        "/quit" | "/exit" => Input::Quit,
        other => Input::Unknown(other),
    }
}

fn render_event(event: &SessionEvent, local: &MemberName) -> Vec<String> {
    match event {
        SessionEvent::Chat { sender, text } => vec![format!("{}: {}", sender, text)],
        SessionEvent::MembershipChanged {
            members,
            joined,
            left,
        } => {
            let mut lines = Vec::with_capacity(joined.len() + left.len() + 1);
            for name in joined {
                if name == local {
                    lines.push(format!("You have joined as {}", name));
                } else {
                    lines.push(format!("{} has connected", name));
                }
            }
            for name in left {
                if name == local {
                    lines.push("You have left".to_string());
                } else {
                    lines.push(format!("{} has disconnected", name));
                }
            }
            lines.push(format_members(members));
            lines
        }
        SessionEvent::TransportFailed { .. } | SessionEvent::Closed => vec![],
    }
}

fn format_members(members: &[MemberName]) -> String {
    if members.is_empty() {
        return "Members: (none)".to_string();
    }
    let names: Vec<&str> = members.iter().map(MemberName::as_str).collect();
    format!("Members ({}): {}", members.len(), names.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_client::{MemoryHub, SessionOptions};
    use std::time::Duration;
    use tempfile::tempdir;

    fn name(s: &str) -> MemberName {
        MemberName::new(s).unwrap()
    }

    fn options() -> SessionOptions {
        SessionOptions {
            leave_grace: Duration::ZERO,
            ..SessionOptions::default()
        }
    }

    // ===========================================
    // Input Parsing Tests
    // ===========================================

    #[test]
    fn parse_plain_text_as_chat() {
        assert_eq!(parse_input("hello world"), Input::Chat("hello world"));
        assert_eq!(parse_input("  indented"), Input::Chat("  indented"));
    }

    #[test]
    fn parse_commands() {
        assert_eq!(parse_input("/who"), Input::Who);
        assert_eq!(parse_input("/sync"), Input::Sync);
        assert_eq!(parse_input("/help"), Input::Help);
        assert_eq!(parse_input("/quit"), Input::Quit);
        assert_eq!(parse_input("/exit"), Input::Quit);
        assert_eq!(parse_input("/who extra words"), Input::Who);
        assert_eq!(parse_input("/dance"), Input::Unknown("/dance"));
    }

    #[test]
    fn parse_blank_lines() {
        assert_eq!(parse_input(""), Input::Empty);
        assert_eq!(parse_input("   "), Input::Empty);
    }

    // ===========================================
    // Rendering Tests
    // ===========================================

    #[test]
    fn render_chat() {
        let event = SessionEvent::Chat {
            sender: name("alice"),
            text: "hi".into(),
        };
        assert_eq!(render_event(&event, &name("me")), vec!["alice: hi"]);
    }

    #[test]
    fn render_membership_change() {
        let event = SessionEvent::MembershipChanged {
            members: vec![name("me"), name("carol")],
            joined: vec![name("carol")],
            left: vec![name("bob")],
        };
        assert_eq!(
            render_event(&event, &name("me")),
            vec![
                "carol has connected",
                "bob has disconnected",
                "Members (2): me, carol"
            ]
        );
    }

    #[test]
    fn render_own_join_and_leave() {
        let joined = SessionEvent::MembershipChanged {
            members: vec![name("me")],
            joined: vec![name("me")],
            left: vec![],
        };
        assert_eq!(render_event(&joined, &name("me"))[0], "You have joined as me");

        let left = SessionEvent::MembershipChanged {
            members: vec![],
            joined: vec![],
            left: vec![name("me")],
        };
        assert_eq!(
            render_event(&left, &name("me")),
            vec!["You have left", "Members: (none)"]
        );
    }

    #[test]
    fn lifecycle_events_render_nothing() {
        assert!(render_event(&SessionEvent::Closed, &name("me")).is_empty());
    }

    // ===========================================
    // Name Resolution Tests
    // ===========================================

    #[tokio::test]
    async fn name_flag_overrides_profile() {
        let dir = tempdir().unwrap();
        Profile::new("alice").unwrap().save(dir.path()).await.unwrap();

        assert_eq!(resolve_name(dir.path(), None).await.unwrap(), name("alice"));
        assert_eq!(
            resolve_name(dir.path(), Some("bob")).await.unwrap(),
            name("bob")
        );
    }

    #[tokio::test]
    async fn missing_profile_without_flag_fails() {
        let dir = tempdir().unwrap();
        assert!(resolve_name(dir.path(), None).await.is_err());
        assert!(resolve_name(dir.path(), Some("SYSTEM")).await.is_err());
    }

    // ===========================================
    // Session Loop Tests
    // ===========================================

    #[tokio::test]
    async fn drive_sends_chat_and_handles_commands() {
        let hub = MemoryHub::new();
        let observer = hub.endpoint();
        let (session, mut events) = ChatSession::start(name("me"), hub.endpoint(), options());
        session.join().await.unwrap();

        let input: &[u8] = b"hello\n/who\n/bogus\n/quit\nnever sent\n";
        let mut out = Vec::new();
        drive(
            &session,
            &mut events,
            input,
            std::future::pending(),
            &mut out,
        )
        .await
        .unwrap();

        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains("Members (1): me"), "{}", printed);
        assert!(printed.contains("Unknown command: /bogus"), "{}", printed);

        let mut seen = Vec::new();
        while let Ok(Ok(datagram)) =
            tokio::time::timeout(Duration::from_millis(100), observer.recv()).await
        {
            seen.push(String::from_utf8(datagram).unwrap());
        }
        assert!(seen.contains(&"me: hello".to_string()), "{:?}", seen);
        assert!(!seen.iter().any(|line| line.contains("never sent")));

        session.leave().await.unwrap();
    }

    #[tokio::test]
    async fn drive_stops_at_end_of_input() {
        let hub = MemoryHub::new();
        let (session, mut events) = ChatSession::start(name("me"), hub.endpoint(), options());
        session.join().await.unwrap();

        let input: &[u8] = b"";
        let mut out = Vec::new();
        drive(&session, &mut events, input, std::future::pending(), &mut out)
            .await
            .unwrap();

        session.leave().await.unwrap();
    }

    #[tokio::test]
    async fn drive_stops_on_shutdown() {
        let hub = MemoryHub::new();
        let (session, mut events) = ChatSession::start(name("me"), hub.endpoint(), options());
        session.join().await.unwrap();

        // Input that never produces a line
        let (_writer, reader) = tokio::io::duplex(64);
        let mut out = Vec::new();
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            drive(
                &session,
                &mut events,
                BufReader::new(reader),
                std::future::ready(()),
                &mut out,
            ),
        )
        .await
        .expect("shutdown should end the loop");
        result.unwrap();

        session.leave().await.unwrap();
    }
}
