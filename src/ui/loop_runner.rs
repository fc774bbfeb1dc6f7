//! Redraw loop for the live status table.

use super::table::{build_table, StatusBoard};
use anyhow::Result;
use ratatui::{backend::CrosstermBackend, Terminal, TerminalOptions, Viewport};
use std::io::{self, Stdout};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Rows taken by borders and the header.
const CHROME_ROWS: u16 = 3;

/// Redraws the status table in an inline viewport until `shutdown` fires.
///
/// The viewport sits below the shell prompt instead of taking over the
/// screen, so there is no raw mode or alternate screen to restore.
pub async fn run(board: StatusBoard, interval: Duration, shutdown: CancellationToken) -> Result<()> {
    let mut terminal = setup_terminal(board.len())?;
    let mut tick = tokio::time::interval(interval);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = tick.tick() => {
                let feeds = board.snapshot();
                terminal.draw(|f| f.render_widget(build_table(&feeds, board.since()), f.area()))?;
            }
        }
    }

    // Leave the final state on screen
    let feeds = board.snapshot();
    terminal.draw(|f| f.render_widget(build_table(&feeds, board.since()), f.area()))?;
    println!();
    Ok(())
}

fn setup_terminal(feed_count: usize) -> Result<Terminal<CrosstermBackend<Stdout>>> {
    let (_, rows) = crossterm::terminal::size().unwrap_or((80, 24));
    let wanted = u16::try_from(feed_count)
        .unwrap_or(u16::MAX)
        .saturating_add(CHROME_ROWS);
    let height = wanted.min(rows.saturating_sub(1)).max(CHROME_ROWS);

    let backend = CrosstermBackend::new(io::stdout());
    let terminal = Terminal::with_options(
        backend,
        TerminalOptions {
            viewport: Viewport::Inline(height),
        },
    )?;
    Ok(terminal)
}
