//! Pixel Canvas entry point
//!
//! Usage: `pixel-canvas [--consistency torn|exact] [config.json]`
//!
//! Starts the canvas service and drives it with line commands on stdin:
//!
//! ```text
//! draw X Y COLOR   paint a cell (COLOR: decimal, 0xRRGGBB or #RRGGBB)
//! canvas           print the canvas as JSON
//! save             save now if there are unsaved changes
//! quit             save and exit (also on end of input)
//! ```

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use pixel_canvas::{CanvasService, Consistency, Flush, Settings};

/// Command-line options
#[derive(Debug, Default, PartialEq, Eq)]
struct Args {
    config: Option<PathBuf>,
    consistency: Option<Consistency>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args, String> {
    let mut parsed = Args::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        if arg == "--consistency" {
            let value = args.next().ok_or("--consistency needs a value")?;
            let consistency = Consistency::from_str(&value)
                .ok_or_else(|| format!("unknown consistency: {}", value))?;
            parsed.consistency = Some(consistency);
        } else if arg.starts_with("--") {
            return Err(format!("unknown option: {}", arg));
        } else if parsed.config.is_none() {
            parsed.config = Some(PathBuf::from(arg));
        } else {
            return Err(format!("unexpected argument: {}", arg));
        }
    }
    Ok(parsed)
}

/// A parsed stdin command
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Draw { x: i32, y: i32, color: u32 },
    Canvas,
    Save,
    Quit,
}

fn parse_command(line: &str) -> Result<Command, String> {
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        return Err("empty command".to_string());
    };
    let command = match verb.to_lowercase().as_str() {
        "draw" => {
            let (Some(x), Some(y), Some(color)) = (parts.next(), parts.next(), parts.next()) else {
                return Err("usage: draw X Y COLOR".to_string());
            };
            Command::Draw {
                x: x.parse().map_err(|_| format!("bad x: {}", x))?,
                y: y.parse().map_err(|_| format!("bad y: {}", y))?,
                color: parse_color(color).ok_or_else(|| format!("bad color: {}", color))?,
            }
        }
        "canvas" => Command::Canvas,
        "save" => Command::Save,
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("unknown command: {}", other)),
    };
    if parts.next().is_some() {
        return Err(format!("too many arguments for {}", verb));
    }
    Ok(command)
}

fn parse_color(s: &str) -> Option<u32> {
    if let Some(hex) = s.strip_prefix('#').or_else(|| s.strip_prefix("0x")) {
        u32::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}

fn main() -> ExitCode {
    env_logger::init();

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}\nusage: pixel-canvas [--consistency torn|exact] [config.json]", e);
            return ExitCode::FAILURE;
        }
    };
    let mut settings = match &args.config {
        Some(path) => Settings::load(path),
        None => Settings::default(),
    };
    if let Some(consistency) = args.consistency {
        settings.consistency = consistency;
    }
    log::info!("Pixel Canvas starting...");

    let service = match CanvasService::start(&settings) {
        Ok(service) => service,
        Err(e) => {
            log::error!("Failed to start canvas service: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let stdin = io::stdin();
    let mut out = io::stdout().lock();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                log::error!("Failed to read input: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let reply = match parse_command(&line) {
            Ok(Command::Draw { x, y, color }) => {
                if service.draw(x, y, color) { "ok".to_string() } else { "rejected".to_string() }
            }
            Ok(Command::Canvas) => service
                .get_canvas()
                .to_json()
                .unwrap_or_else(|e| format!("error: {}", e)),
            Ok(Command::Save) => match service.flush_now() {
                Ok(Flush::Saved) => "saved".to_string(),
                Ok(Flush::Clean) => "clean".to_string(),
                Err(e) => format!("error: {}", e),
            },
            Ok(Command::Quit) => break,
            Err(e) => format!("error: {}", e),
        };
        if writeln!(out, "{}", reply).is_err() {
            break;
        }
    }

    service.shutdown();
    log::info!("Pixel Canvas stopped");
    ExitCode::SUCCESS
}
