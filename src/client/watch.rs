//! Terminal client: prints the board and sends moves typed on stdin.

use super::projection::{Projection, ProjectionUpdate};
use crate::games::chess::{MoveRequest, PieceKind, Square};
use crate::protocol::{ClientMessage, ServerMessage};
use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, instrument, warn};

/// Parses `e2e4`, `e2 e4`, `e2-e4` or `e7e8q` into squares and promotion.
pub fn parse_move_input(line: &str) -> Option<(Square, Square, Option<PieceKind>)> {
    let compact: String = line
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();
    if !compact.is_ascii() || !(4..=5).contains(&compact.len()) {
        return None;
    }
    let from = Square::parse(&compact[0..2]).ok()?;
    let to = Square::parse(&compact[2..4]).ok()?;
    let promotion = match compact.get(4..5) {
        Some(code) => Some(PieceKind::parse(code).ok()?),
        None => None,
    };
    Some((from, to, promotion))
}

/// Connects to `url` and runs until the socket or stdin closes.
#[instrument]
pub async fn run_watch(url: &str) -> Result<()> {
    let (socket, _) = connect_async(url)
        .await
        .with_context(|| format!("Failed to connect to {}", url))?;
    info!("Connected");
    let (mut sink, mut stream) = socket.split();

    let mut projection = Projection::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            frame = stream.next() => {
                let Some(frame) = frame else { break };
                match frame.context("Socket error")? {
                    Message::Text(text) => {
                        let message: ServerMessage = match serde_json::from_str(text.as_str()) {
                            Ok(message) => message,
                            Err(e) => {
                                warn!(error = %e, "Ignoring undecodable server frame");
                                continue;
                            }
                        };
                        show(&mut projection, &message);
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let Some(request) = prepare(&projection, &line) else { continue };
                let text = serde_json::to_string(&ClientMessage::Move(request))?;
                sink.send(Message::text(text)).await?;
            }
        }
    }

    info!("Disconnected");
    Ok(())
}

/// Applies and prints one server message. A bad snapshot keeps the previous board.
fn show(projection: &mut Projection, message: &ServerMessage) -> Option<ProjectionUpdate> {
    let update = match projection.apply(message) {
        Ok(update) => update,
        Err(e) => {
            warn!(error = %e, "Ignoring unusable board state");
            return None;
        }
    };
    match &update {
        ProjectionUpdate::Role(assignment) => println!("You are {}", assignment),
        ProjectionUpdate::Board => {
            println!("\n{}", projection.render());
            if let Some(fen) = projection.fen() {
                println!("{}", fen);
            }
        }
        ProjectionUpdate::LastMove(request) => println!("Move: {}", request),
        ProjectionUpdate::Rejected(reason) => println!("Move refused: {}", reason),
    }
    Some(update)
}

fn prepare(projection: &Projection, line: &str) -> Option<MoveRequest> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let Some((from, to, promotion)) = parse_move_input(line) else {
        println!("Enter moves like e2e4 or e7e8q");
        return None;
    };
    if !projection.can_drag(from) {
        println!("No piece of yours on {}", from);
        return None;
    }
    let mut request = projection.move_request(from, to);
    if let Some(kind) = promotion {
        request.promotion = Some(kind.to_string());
    }
    debug!(%request, "Sending move");
    Some(request)
}
