//! Offline replay of a recorded message journal.
//!
//! A journal is a JSON-lines file with one `{type, payload}` envelope per
//! line, in the order the server relayed them.

use crate::board::{Board, BoardResult};
use sketchwire_core::{CoordinateMapper, LoopbackTransport, Message};
use sketchwire_render::RenderConfig;

/// Decode a journal, skipping blank lines and logging lines that do not parse.
pub fn read_journal(text: &str) -> Vec<Message> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(n, line)| match Message::decode(line) {
            Ok(message) => Some(message),
            Err(e) => {
                log::warn!("journal line {}: {e}", n + 1);
                None
            }
        })
        .collect()
}

/// Apply every journal message to a fresh board and render it once.
pub fn replay_journal(
    text: &str,
    mapper: CoordinateMapper,
    config: RenderConfig,
) -> BoardResult<Board<LoopbackTransport>> {
    let mut board = Board::new(LoopbackTransport::new(), mapper, config)?;
    let messages = read_journal(text);
    log::info!("replaying {} messages", messages.len());
    for message in messages {
        board.transport_mut().inject_message(message);
    }
    board.pump();
    Ok(board)
}
