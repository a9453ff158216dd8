mod audio;
mod auth;
mod command;
mod config;
mod feedback;
mod spotify;
mod voice;

use std::io::BufRead;
use std::io::Write;
use std::sync::Arc;
use std::thread;

use anyhow::Result;
use clap::{Parser, Subcommand};

use auth::SpotifyAuth;
use command::{CommandResult, CommandRouter};
use config::Config;
use feedback::Feedback;
use spotify::{SpotifyBackend, WebApiBackend};
use voice::VoiceInput;

#[derive(Parser)]
#[command(name = "croon", about = "Voice and text control for Spotify playback")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// One-time OAuth bootstrap: open the printed URL, paste the redirect back
    Auth,
    /// Run a single command and exit (e.g. `croon exec pause`)
    Exec { text: Vec<String> },
}

enum ShellEvent {
    Heard(String),
    Result(CommandResult),
}

fn main() -> Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load();

    match cli.command {
        Some(Command::Auth) => run_auth(&config),
        Some(Command::Exec { text }) => run_exec(&config, &text.join(" ")),
        None => run_shell(config).await,
    }
}

fn backend_from(config: &Config) -> Arc<dyn SpotifyBackend> {
    Arc::new(WebApiBackend::new(SpotifyAuth::new(&config.spotify)))
}

fn run_auth(config: &Config) -> Result<()> {
    let auth = SpotifyAuth::new(&config.spotify);
    println!("Open this URL in a browser and approve access:\n");
    println!("  {}\n", auth.authorize_url());
    print!("Paste the redirect URL (or just the code): ");
    std::io::stdout().flush()?;

    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    let code = extract_code(line.trim());
    auth.exchange_code(code)?;

    let backend = WebApiBackend::new(auth);
    match backend.current_user() {
        Ok(name) => println!("Authorized as {name}"),
        Err(e) => eprintln!("Tokens stored, but the auth probe failed: {e}"),
    }
    Ok(())
}

/// Accept either a bare code or the full redirect URL it came back in.
fn extract_code(input: &str) -> &str {
    match input.split_once("code=") {
        Some((_, rest)) => rest.split('&').next().unwrap_or(rest),
        None => input,
    }
}

fn run_exec(config: &Config, text: &str) -> Result<()> {
    let router = CommandRouter::new(backend_from(config));
    let result = router.execute(text);
    println!("{} {}", if result.success { "✓" } else { "✗" }, result.message);
    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_shell(config: Config) -> Result<()> {
    let backend = backend_from(&config);
    let router = CommandRouter::new(backend.clone());
    let voice = Arc::new(VoiceInput::new(&config.voice));
    let mut feedback = Feedback::new(&config.feedback);

    match backend.current_user() {
        Ok(name) => println!("Logged in as: {name}"),
        Err(e) => eprintln!("Spotify auth check failed: {e}"),
    }
    println!("Type a command, 'voice' to speak one, 'help' for the list, 'quit' to exit.\n");

    // Channel: stdin reader -> shell loop
    let (input_tx, input_rx) = flume::unbounded::<String>();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if input_tx.send(line).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });

    // Channel: command/voice workers -> shell loop
    let (event_tx, event_rx) = flume::unbounded::<ShellEvent>();

    let (quit_tx, quit_rx) = flume::bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = quit_tx.send(());
    })?;

    // One command in flight at a time; the loop refuses input while busy.
    let mut busy = false;

    loop {
        tokio::select! {
            Ok(line) = input_rx.recv_async() => {
                let line = line.trim().to_string();
                if line.is_empty() {
                    continue;
                }
                match line.as_str() {
                    "quit" | "exit" => break,
                    "help" | "commands" => print_help(),
                    _ if busy => println!("Still working on the previous command..."),
                    "voice" | "v" => {
                        busy = true;
                        println!("Listening...");
                        spawn_voice_worker(voice.clone(), router.clone(), event_tx.clone());
                    }
                    _ => {
                        busy = true;
                        spawn_command_worker(line, router.clone(), event_tx.clone());
                    }
                }
            }

            Ok(event) = event_rx.recv_async() => {
                match event {
                    ShellEvent::Heard(text) => println!("> {text}"),
                    ShellEvent::Result(result) => {
                        busy = false;
                        let mark = if result.success { "✓" } else { "✗" };
                        println!("{mark} {}", result.message);
                        feedback.notify(result.success);
                        feedback.speak(&result.message);
                    }
                }
            }

            Ok(()) = quit_rx.recv_async() => break,
        }
    }

    feedback.shutdown();
    Ok(())
}

fn spawn_command_worker(
    text: String,
    router: CommandRouter,
    event_tx: flume::Sender<ShellEvent>,
) {
    thread::spawn(move || {
        let _ = event_tx.send(ShellEvent::Result(router.execute(&text)));
    });
}

fn spawn_voice_worker(
    voice: Arc<VoiceInput>,
    router: CommandRouter,
    event_tx: flume::Sender<ShellEvent>,
) {
    thread::spawn(move || match voice.listen() {
        Ok(text) => {
            let _ = event_tx.send(ShellEvent::Heard(text.clone()));
            let _ = event_tx.send(ShellEvent::Result(router.execute(&text)));
        }
        Err(e) => {
            let _ = event_tx.send(ShellEvent::Result(CommandResult::fail(e.to_string())));
        }
    });
}

fn print_help() {
    println!(
        "\
Commands:
  play [song]                   - search and play a track
  play artist [name]            - play an artist
  play playlist [name]          - play one of your playlists
  pause / resume                - pause or resume playback
  skip / next                   - next track
  previous / back               - previous track
  volume [0-100]                - set volume
  shuffle on|off                - toggle shuffle
  repeat track|context|off      - set repeat mode
  create playlist [name]        - create a new playlist
  add [song] to playlist [name] - add a track to a playlist
  voice (or v)                  - speak a command
  help, quit"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_code() {
        assert_eq!(extract_code("AQBx-abc123"), "AQBx-abc123");
        assert_eq!(
            extract_code("http://localhost:8080/callback?code=AQBx-abc123&state=x"),
            "AQBx-abc123"
        );
        assert_eq!(
            extract_code("http://localhost:8080/callback?code=AQBx-abc123"),
            "AQBx-abc123"
        );
    }
}
