use crate::feed::{FeedSnapshot, FeedStatus};
use crate::util::strip_control_chars;
use chrono::{DateTime, Utc};
use ratatui::{
    layout::Constraint,
    style::{Color, Modifier, Style},
    text::Span,
    widgets::{Block, Borders, Row, Table},
};
use tokio::sync::watch;
use unicode_width::UnicodeWidthStr;

/// Widest the Source column gets before titles are cut by the table.
const MAX_SOURCE_WIDTH: u16 = 48;
const STATUS_WIDTH: u16 = 28;

/// Live view over every feed's snapshot channel.
pub struct StatusBoard {
    watchers: Vec<watch::Receiver<FeedSnapshot>>,
    since: DateTime<Utc>,
}

impl StatusBoard {
    pub fn new(watchers: Vec<watch::Receiver<FeedSnapshot>>, since: DateTime<Utc>) -> Self {
        Self { watchers, since }
    }

    pub fn since(&self) -> DateTime<Utc> {
        self.since
    }

    pub fn len(&self) -> usize {
        self.watchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watchers.is_empty()
    }

    /// Latest snapshot of every feed, in feed list order.
    pub fn snapshot(&self) -> Vec<FeedSnapshot> {
        self.watchers.iter().map(|w| w.borrow().clone()).collect()
    }
}

fn status_style(status: &FeedStatus) -> Style {
    match status {
        FeedStatus::Pending => Style::default().fg(Color::DarkGray),
        FeedStatus::Checking => Style::default().fg(Color::Yellow),
        FeedStatus::Unchanged | FeedStatus::Ok => Style::default().fg(Color::Green),
        FeedStatus::ParseError(_) | FeedStatus::HttpError(_) | FeedStatus::Unreachable(_) => {
            Style::default().fg(Color::Red)
        }
    }
}

fn format_time(t: Option<DateTime<Utc>>) -> String {
    t.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn or_dash(s: Option<&str>) -> String {
    s.map(|s| strip_control_chars(s).into_owned())
        .unwrap_or_else(|| "-".to_string())
}

/// Build the status table for a set of snapshots.
pub fn build_table(feeds: &[FeedSnapshot], since: DateTime<Utc>) -> Table<'static> {
    let source_width = feeds
        .iter()
        .map(|f| f.title.width())
        .max()
        .unwrap_or(0)
        .clamp(6, MAX_SOURCE_WIDTH as usize) as u16;

    let header = Row::new(vec![
        "Source",
        "Status",
        "Last Checked",
        "Updated",
        "ETag",
        "Modified",
    ])
    .style(Style::default().add_modifier(Modifier::BOLD));

    let rows: Vec<Row> = feeds
        .iter()
        .map(|feed| {
            Row::new(vec![
                Span::raw(strip_control_chars(&feed.title).into_owned()),
                Span::styled(feed.status.to_string(), status_style(&feed.status)),
                Span::raw(format_time(feed.last_checked)),
                Span::raw(format_time(feed.updated)),
                Span::raw(or_dash(feed.validator.as_deref())),
                Span::raw(or_dash(feed.last_modified.as_deref())),
            ])
        })
        .collect();

    // Modified holds an RFC 1123 date: 29 columns
    let widths = [
        Constraint::Length(source_width),
        Constraint::Length(STATUS_WIDTH),
        Constraint::Length(19),
        Constraint::Length(19),
        Constraint::Fill(1),
        Constraint::Length(29),
    ];

    Table::new(rows, widths).header(header).block(
        Block::default().borders(Borders::ALL).title(format!(
            "Feeds (checking since {})",
            since.format("%Y-%m-%d %H:%M UTC")
        )),
    )
}
