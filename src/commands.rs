//! CLI commands
//! This module defines the commands the `g1-bridge` binary can run.

use std::path::{Path, PathBuf};

use log::info;
use serde_json::json;
use tokio::fs;

use crate::core::render::{BitmapRenderer, bitmap_to_base64};
use crate::state::AppState;

pub const USAGE: &str = "\
Usage: g1-bridge <command>

Commands:
  text <message>                 show text on the glasses
  image <file.bmp>               send a 576x136 1-bit BMP
  render <message> <out.bmp>     render text to a BMP file, no Bluetooth needed
  teleprompter <message> [0-100] start or update the teleprompter
  teleprompter-exit              end the teleprompter session
  exit                           return to the dashboard
  status                         print battery, uptime and firmware";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Text(String),
    Image(PathBuf),
    Render { text: String, output: PathBuf },
    Teleprompter { text: String, scroll: Option<u8> },
    TeleprompterExit,
    Exit,
    Status,
}

impl Command {
    /// Parses the arguments following the program name.
    pub fn parse(args: &[String]) -> Result<Self, String> {
        let (name, rest) = args.split_first().ok_or_else(|| USAGE.to_string())?;
        let arg = |index: usize, what: &str| {
            rest.get(index)
                .cloned()
                .ok_or_else(|| format!("`{}` needs {}\n\n{}", name, what, USAGE))
        };

        match name.as_str() {
            "text" => Ok(Command::Text(arg(0, "a message")?)),
            "image" => Ok(Command::Image(PathBuf::from(arg(0, "a BMP file")?))),
            "render" => Ok(Command::Render {
                text: arg(0, "a message")?,
                output: PathBuf::from(arg(1, "an output file")?),
            }),
            "teleprompter" => {
                let text = arg(0, "a message")?;
                let scroll = match rest.get(1) {
                    Some(value) => Some(
                        value
                            .parse::<u8>()
                            .map_err(|_| format!("Invalid scroll position: {}", value))?,
                    ),
                    None => None,
                };
                Ok(Command::Teleprompter { text, scroll })
            }
            "teleprompter-exit" => Ok(Command::TeleprompterExit),
            "exit" => Ok(Command::Exit),
            "status" => Ok(Command::Status),
            other => Err(format!("Unknown command: {}\n\n{}", other, USAGE)),
        }
    }

    /// Every command but `render` talks to the glasses.
    pub fn needs_connection(&self) -> bool {
        !matches!(self, Command::Render { .. })
    }
}

fn report(sent: bool, what: &str) -> Result<String, String> {
    if sent {
        Ok(format!("{} sent", what))
    } else {
        Err(format!("{} failed on at least one side", what))
    }
}

/// Renders `text` into a BMP file at `output`.
pub async fn render_to_file(text: &str, output: &Path) -> Result<String, String> {
    let bmp = BitmapRenderer::default()
        .text_to_bitmap(text)
        .map_err(|e| e.to_string())?;
    fs::write(output, &bmp).await.map_err(|e| e.to_string())?;
    info!("Wrote {} bytes to {:?}", bmp.len(), output);
    Ok(format!("Rendered {} bytes to {}", bmp.len(), output.display()))
}

/// Runs `command` against the connected devices.
pub async fn run(command: &Command, app_state: &AppState) -> Result<String, String> {
    let glasses = &app_state.glasses;

    match command {
        Command::Text(text) => {
            let sent = glasses.send_text(text).await.map_err(|e| e.to_string())?;
            report(sent, "Text")
        }
        Command::Image(path) => {
            let bmp = fs::read(path).await.map_err(|e| e.to_string())?;
            let sent = glasses
                .send_image(&bitmap_to_base64(&bmp))
                .await
                .map_err(|e| e.to_string())?;
            report(sent, "Image")
        }
        Command::Render { text, output } => render_to_file(text, output).await,
        Command::Teleprompter { text, scroll } => {
            let sent = glasses
                .send_official_teleprompter(text, *scroll)
                .await
                .map_err(|e| e.to_string())?;
            report(sent, "Teleprompter text")
        }
        Command::TeleprompterExit => {
            let sent = glasses
                .exit_official_teleprompter()
                .await
                .map_err(|e| e.to_string())?;
            report(sent, "Teleprompter exit")
        }
        Command::Exit => {
            let sent = glasses.exit().await.map_err(|e| e.to_string())?;
            report(sent, "Exit")
        }
        Command::Status => {
            glasses.refresh_battery_info().await;
            glasses.refresh_uptime().await;
            let ring = if app_state.ring.is_connected() {
                app_state.ring.refresh_battery_info().await
            } else {
                app_state.ring.get_ring_status()
            };
            let status = json!({
                "glasses": glasses.get_device_status(),
                "ring": ring,
            });
            serde_json::to_string_pretty(&status).map_err(|e| e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            Command::parse(&args(&["text", "Hello"])).unwrap(),
            Command::Text("Hello".to_string())
        );
        assert_eq!(
            Command::parse(&args(&["teleprompter", "Go", "40"])).unwrap(),
            Command::Teleprompter {
                text: "Go".to_string(),
                scroll: Some(40)
            }
        );
        assert_eq!(
            Command::parse(&args(&["teleprompter", "Go"])).unwrap(),
            Command::Teleprompter {
                text: "Go".to_string(),
                scroll: None
            }
        );
        assert_eq!(Command::parse(&args(&["status"])).unwrap(), Command::Status);
    }

    #[test]
    fn test_parse_errors() {
        assert!(Command::parse(&[]).is_err());
        assert!(Command::parse(&args(&["text"])).is_err());
        assert!(Command::parse(&args(&["teleprompter", "Go", "fast"])).is_err());
        assert!(Command::parse(&args(&["dance"])).unwrap_err().starts_with("Unknown command"));
    }

    #[test]
    fn test_only_render_works_offline() {
        let render = Command::parse(&args(&["render", "Hi", "out.bmp"])).unwrap();
        assert!(!render.needs_connection());
        assert!(Command::Exit.needs_connection());
    }

    #[tokio::test]
    async fn test_render_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("hello.bmp");

        render_to_file("HELLO", &output).await.unwrap();

        let bmp = fs::read(&output).await.unwrap();
        assert!(BitmapRenderer::default().validate_bmp_format(&bmp));
    }
}
