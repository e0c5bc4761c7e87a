//! Standalone client binary.
//!
//! Usage:
//!   cargo run -p plaza_client -- [--config client.json] [--url ws://127.0.0.1:3000/ws]
//!       [--name Player] [--background map.png] [--assets-dir assets] [--size 800x600]
//!
//! The client connects to the authority, keeps the world in sync and paints
//! every frame into an in-memory surface that `shot` saves as PNG.
//!
//! Type `help` for the console commands.

use std::env;
use std::io::{BufRead, Write};
use std::sync::Arc;

use anyhow::Context;
use plaza_client::{
    assets::DefaultImageSource,
    client::{ClientCommand, Flow, WorldClient},
    console::{parse_line, ConsoleAction, HELP},
    raster::RasterSurface,
};
use plaza_shared::{chat::ChatKind, clock::SystemClock, config::ClientConfig, render::Surface};
use tokio::sync::mpsc;
use tracing::{info, warn};

async fn parse_args() -> anyhow::Result<ClientConfig> {
    let args: Vec<String> = env::args().collect();

    let mut cfg = match args.iter().position(|a| a == "--config") {
        Some(i) if i + 1 < args.len() => {
            let text = tokio::fs::read_to_string(&args[i + 1])
                .await
                .with_context(|| format!("read config {}", args[i + 1]))?;
            ClientConfig::from_json_str(&text).context("parse config")?
        }
        _ => ClientConfig::default(),
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--url" if i + 1 < args.len() => {
                cfg.server_url = args[i + 1].clone();
                i += 2;
            }
            "--name" if i + 1 < args.len() => {
                cfg.player_name = args[i + 1].clone();
                i += 2;
            }
            "--background" if i + 1 < args.len() => {
                cfg.background = Some(args[i + 1].clone());
                i += 2;
            }
            "--assets-dir" if i + 1 < args.len() => {
                cfg.assets_dir = args[i + 1].clone();
                i += 2;
            }
            "--size" if i + 1 < args.len() => {
                if let Some((w, h)) = args[i + 1].split_once('x') {
                    cfg.surface_width = w.parse().unwrap_or(cfg.surface_width);
                    cfg.surface_height = h.parse().unwrap_or(cfg.surface_height);
                }
                i += 2;
            }
            _ => i += 1,
        }
    }
    Ok(cfg)
}

fn print_status(client: &WorldClient) {
    println!("State: {:?}", client.state);
    println!("Channel: {:?}", client.channel_status());
    if let Some(id) = client.local_id() {
        println!("Player ID: {id}");
    }
    if let Some(pos) = client.world().local_position() {
        println!("Position: ({:.1}, {:.1})", pos.x, pos.y);
    }
    let cam = client.camera().rect();
    println!("Camera: ({:.1}, {:.1}) {}x{}", cam.x, cam.y, cam.width, cam.height);
    println!("Players: {}", client.world().len());
    println!("Active emotes: {}", client.effects().len());
    println!("Pending images: {}", client.assets().pending());
    println!("Frames rendered: {}", client.frames_rendered());
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = parse_args().await?;
    info!(server = %cfg.server_url, name = %cfg.player_name, "Starting client");

    let images = Arc::new(DefaultImageSource::from_config(&cfg));
    let mut surface = RasterSurface::new(cfg.surface_width, cfg.surface_height);
    let mut client = WorldClient::new(cfg.clone(), images, Arc::new(SystemClock::new()));
    client.connect().await.context("connect")?;

    // Set up console input channel.
    let (console_tx, mut console_rx) = mpsc::channel::<String>(32);

    // Spawn stdin reader thread.
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        loop {
            print!("] ");
            let _ = stdout.flush();
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = line.trim().to_string();
            if !line.is_empty() && console_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    println!("Client connected. Type 'join' to enter the world, 'help' for commands.");
    println!();

    let (command_tx, mut command_rx) = mpsc::channel::<ClientCommand>(32);
    let mut chat_seen = client.chat().pushed();
    client.render(&mut surface);

    loop {
        tokio::select! {
            line = console_rx.recv() => {
                let Some(line) = line else {
                    break;
                };
                match parse_line(&line, &cfg.player_name) {
                    ConsoleAction::Commands(commands) => {
                        for command in commands {
                            command_tx.send(command).await.context("queue command")?;
                        }
                    }
                    ConsoleAction::Avatar(path) => match tokio::fs::read(&path).await {
                        Ok(bytes) => {
                            command_tx
                                .send(ClientCommand::UploadAvatar(bytes))
                                .await
                                .context("queue command")?;
                        }
                        Err(e) => println!("Cannot read {}: {}", path.display(), e),
                    },
                    ConsoleAction::Shot(path) => match surface.save_png(&path) {
                        Ok(()) => {
                            let (w, h) = surface.size();
                            println!("Saved {}x{} frame to {}", w, h, path.display());
                        }
                        Err(e) => println!("Error: {e:#}"),
                    },
                    ConsoleAction::Status => print_status(&client),
                    ConsoleAction::Who => {
                        for p in client.world().players() {
                            let me = if client.local_id() == Some(&p.id) { " (you)" } else { "" };
                            println!("{} {}{} at ({:.0}, {:.0}) facing {}", p.id, p.username, me, p.x, p.y, p.facing);
                        }
                    }
                    ConsoleAction::Chat => {
                        for entry in client.chat().iter() {
                            println!("[{}] {}: {}", entry.timestamp.format("%H:%M:%S"), entry.sender, entry.text);
                        }
                    }
                    ConsoleAction::Help => {
                        for line in HELP {
                            println!("{line}");
                        }
                    }
                    ConsoleAction::Usage(usage) => println!("{usage}"),
                    ConsoleAction::Unknown(cmd) => println!("Unknown command: {cmd}"),
                }
            }
            // Only the wait races the console; handling always runs to completion.
            wake = client.wait(&mut command_rx) => {
                match client.handle(wake, &mut surface).await {
                    Ok(Flow::Quit) => break,
                    Ok(Flow::Continue) => {}
                    Err(e) => warn!(error = %format!("{e:#}"), "Client error"),
                }
            }
        }

        // Echo chat lines that arrived since the last iteration.
        for entry in client.chat().since(chat_seen) {
            match entry.kind {
                ChatKind::System => println!("* {}", entry.text),
                ChatKind::Own | ChatKind::Other => println!("<{}> {}", entry.sender, entry.text),
            }
        }
        chat_seen = client.chat().pushed();
    }

    client.disconnect().await;
    Ok(())
}
