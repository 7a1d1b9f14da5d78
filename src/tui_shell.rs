use std::collections::BTreeMap;
use std::io::{self, IsTerminal};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use crate::channel::{PushChannel, Subscription};
use crate::console::{Console, Dispatch, Notice, NoticeLevel};
use crate::edit::{CellRef, EditInput, EditState};
use crate::model::{EntityKind, RecordId};
use crate::remote::StoreSet;
use crate::tui::TuiRunOptions;

mod app;
use app::App;

mod input;
use input::Input;

mod modal;
use modal::Modal;

mod render;

pub(crate) fn run(opts: TuiRunOptions) -> Result<()> {
    if !io::stdin().is_terminal() || !io::stdout().is_terminal() {
        anyhow::bail!("TUI requires an interactive terminal (TTY)");
    }

    let stores = StoreSet::http(&opts.config)?;
    let mut console = Console::new(stores, &opts.config, Dispatch::Background);
    let channel = if opts.offline {
        None
    } else {
        Some(PushChannel::connect(
            opts.config.push_url(),
            opts.config.channel_settings(),
        ))
    };
    let subscription = channel.as_ref().map(|c| console.attach(c));
    console.load_all();

    let mut stdout = io::stdout();
    enable_raw_mode().context("enable raw mode")?;
    execute!(stdout, EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    let mut app = App::new(console, channel, subscription);
    let res = run_loop(&mut terminal, &mut app);

    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();

    app.shutdown();
    res
}

fn run_loop(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    loop {
        app.console.pump();
        app.console.tick(Instant::now());
        app.collect_notices();
        app.sync_modal();

        terminal.draw(|f| render::draw(f, app)).context("draw")?;
        if app.quit {
            return Ok(());
        }

        if event::poll(Duration::from_millis(50)).context("poll")? {
            match event::read().context("read event")? {
                Event::Key(k) if k.kind == KeyEventKind::Press => app.handle_key(k),
                _ => {}
            }
        }
    }
}
