//! Interactive terminal front end bound to the host's microphone, speakers
//! and narrator.

use crate::agent::SupportAgent;
use crate::cli::Args;
use crate::conversation::{ ConversationSession, SessionEvent };
use crate::language::LanguageCode;
use crate::models::chat::{ Message, Sender };
use crate::models::notice::Severity;
use crate::speech::platform::{ SystemPlatform, SystemPlatformConfig };

use log::warn;
use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;
use tokio::io::{ AsyncBufReadExt, BufReader };
use tokio::sync::mpsc;

const HELP: &str = "Commands:
  /lang en|te   select the voice input language
  /record       start recording from the microphone
  /stop         stop recording and transcribe
  /send         send the last transcription
  /play [n]     play message n (default: the last reply)
  /hush         stop playback
  /quit         leave";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Say(String),
    Language(Option<LanguageCode>),
    Record,
    Stop,
    Send,
    Play(Option<usize>),
    Hush,
    Help,
    Quit,
    Unknown(String),
}

fn parse_command(line: &str) -> Command {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return Command::Say(line.to_string());
    };
    let mut parts = rest.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let arg = parts.next();
    match name {
        "lang" | "language" => Command::Language(arg.and_then(LanguageCode::from_str_loose)),
        "record" | "rec" => Command::Record,
        "stop" => Command::Stop,
        "send" => Command::Send,
        "play" => Command::Play(arg.and_then(|n| n.parse().ok())),
        "hush" => Command::Hush,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => Command::Unknown(other.to_string()),
    }
}

fn speaker(message: &Message) -> &'static str {
    match message.sender {
        Sender::User => "You",
        Sender::Bot => "TeRA",
    }
}

/// Renders session events; numbers messages in log order so `/play n` can refer to them.
async fn print_events(mut events: mpsc::UnboundedReceiver<SessionEvent>) {
    let mut numbers: HashMap<String, usize> = HashMap::new();
    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::Welcome(message) | SessionEvent::MessageAppended(message) => {
                let n = numbers.len() + 1;
                numbers.insert(message.id.clone(), n);
                println!("[{}] {} ({}): {}", n, speaker(&message), message.language, message.text);
            }
            SessionEvent::AudioAttached { id, .. } => {
                if let Some(n) = numbers.get(&id) {
                    println!("    audio ready for [{}]", n);
                }
            }
            SessionEvent::Typing(true) => println!("TeRA is typing..."),
            SessionEvent::Recording(true) => println!("Recording... type /stop when done."),
            SessionEvent::Transcribing(true) => println!("Transcribing..."),
            SessionEvent::Transcription(text) => {
                println!("Transcribed: {}\n    (/send to send it, or type your own message)", text)
            }
            SessionEvent::Playing { id, playing: true } => {
                if let Some(n) = numbers.get(&id) {
                    println!("    playing [{}]", n);
                }
            }
            SessionEvent::Notice(notice) => {
                let tag = match notice.severity {
                    Severity::Info => "note",
                    Severity::Warning => "warning",
                    Severity::Destructive => "error",
                };
                println!("[{}] {}: {}", tag, notice.title, notice.description);
            }
            _ => {}
        }
    }
}

pub async fn run_terminal(
    agent: Arc<SupportAgent>,
    args: &Args
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let (platform, mut playback_events) = SystemPlatform::new(SystemPlatformConfig {
        recorder: args.recorder_cmd.clone(),
        player: args.player_cmd.clone(),
        narrator: args.narrator_cmd.clone(),
    });
    let (mut session, events) = ConversationSession::new(agent, args.default_language);
    let printer = tokio::spawn(print_events(events));

    println!("{}\n", HELP);
    let welcome = session.start().await;
    if args.autoplay && welcome.audio_data_uri.is_some() {
        if let Err(e) = session.play_message(&welcome.id, &platform).await {
            warn!("Autoplay skipped: {}", e);
        }
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut pending_transcription: Option<String> = None;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let text = match parse_command(&line) {
                    Command::Say(text) => text,
                    Command::Send => match pending_transcription.take() {
                        Some(text) => text,
                        None => {
                            println!("Nothing transcribed yet.");
                            continue;
                        }
                    },
                    Command::Language(Some(lang)) => {
                        session.set_voice_language(lang);
                        println!("Voice input language: {}", lang.name());
                        continue;
                    }
                    Command::Language(None) => {
                        println!("Usage: /lang en|te");
                        continue;
                    }
                    Command::Record => {
                        session.start_recording(&platform).await;
                        continue;
                    }
                    Command::Stop => {
                        if session.is_recording() {
                            pending_transcription = session.stop_recording(&platform).await;
                        } else {
                            println!("Not recording.");
                        }
                        continue;
                    }
                    Command::Play(n) => {
                        let target = match n {
                            Some(n) => session.messages().get(n.wrapping_sub(1)),
                            None => session.last_bot_message(),
                        }.map(|m| m.id.clone());
                        match target {
                            Some(id) => {
                                if let Err(e) = session.play_message(&id, &platform).await {
                                    println!("{}", e);
                                }
                            }
                            None => println!("No such message."),
                        }
                        continue;
                    }
                    Command::Hush => {
                        session.stop_playback(&platform).await;
                        continue;
                    }
                    Command::Help => {
                        println!("{}", HELP);
                        continue;
                    }
                    Command::Quit => break,
                    Command::Unknown(name) => {
                        println!("Unknown command '/{}'. Type /help.", name);
                        continue;
                    }
                };

                if let Some(reply) = session.submit_message(&text).await {
                    if args.autoplay && reply.audio_data_uri.is_some() {
                        if let Err(e) = session.play_message(&reply.id, &platform).await {
                            warn!("Autoplay skipped: {}", e);
                        }
                    }
                }
            }
            Some(event) = playback_events.recv() => {
                session.on_playback_event(event);
            }
        }
    }

    if session.is_recording() {
        session.stop_recording(&platform).await;
    }
    session.stop_playback(&platform).await;
    drop(session);
    let _ = printer.await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("  hello "), Command::Say("hello".to_string()));
        assert_eq!(parse_command("/lang te"), Command::Language(Some(LanguageCode::Telugu)));
        assert_eq!(parse_command("/lang klingon"), Command::Language(None));
        assert_eq!(parse_command("/play 3"), Command::Play(Some(3)));
        assert_eq!(parse_command("/play"), Command::Play(None));
        assert_eq!(parse_command("/quit"), Command::Quit);
        assert_eq!(parse_command("/dance"), Command::Unknown("dance".to_string()));
    }
}
