//! Terminal front end: draws session snapshots and turns input into commands.

mod app;
mod event;
mod ui;

use std::io;

use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tokio::sync::watch;

use crate::config::Config;
use crate::engine::Target;
use crate::session::{Command, SessionHandle, Snapshot};

pub use app::{App, Mode};
use event::{Event, EventHandler};

type Term = Terminal<CrosstermBackend<io::Stdout>>;

fn init_terminal() -> io::Result<Term> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    Terminal::new(CrosstermBackend::new(stdout))
}

fn restore_terminal(terminal: &mut Term) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()
}

/// Open `target` and run the UI until the user quits. The terminal is
/// restored on every exit path.
pub async fn run(
    session: SessionHandle,
    snapshots: watch::Receiver<Snapshot>,
    config: Config,
    target: Target,
) -> io::Result<()> {
    let mut terminal = init_terminal()?;
    let result = event_loop(&mut terminal, session, snapshots, config, target).await;
    restore_terminal(&mut terminal)?;
    result
}

async fn event_loop(
    terminal: &mut Term,
    session: SessionHandle,
    mut snapshots: watch::Receiver<Snapshot>,
    config: Config,
    target: Target,
) -> io::Result<()> {
    let size = terminal.size()?;
    let mut app = App::new(config, (size.width, size.height));
    let mut events = EventHandler::new();

    session.send(Command::Resize(App::capacity_for(size.height))).await;
    session.send(Command::Open(target)).await;

    let mut shown = None;
    while !app.should_quit {
        terminal.draw(|frame| ui::draw(frame, &app))?;

        let columns = app.visible_columns(app.size.0);
        let layout = Some((app.snapshot.epoch, columns.clone()));
        if layout != shown {
            shown = layout;
            if !session.send(Command::ShowColumns(columns)).await {
                break;
            }
        }

        let command = tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    tracing::warn!("session ended");
                    break;
                }
                app.set_snapshot(snapshots.borrow_and_update().clone());
                None
            }
            event = events.next() => match event {
                Some(Event::Key(key)) => app.handle_key(key),
                Some(Event::Mouse(mouse)) => app.handle_mouse(mouse),
                Some(Event::Resize(width, height)) => {
                    app.size = (width, height);
                    Some(Command::Resize(App::capacity_for(height)))
                }
                None => break,
            },
        };
        if let Some(command) = command
            && !session.send(command).await
        {
            break;
        }
    }
    session.shutdown();
    Ok(())
}
