pub mod app;
pub mod collections;
pub mod config;
pub mod editor;
pub mod error;
pub mod events;
pub mod filesystem;
pub mod fonts;
pub mod grid;
pub mod models;
pub mod notes;
pub mod search;
pub mod shortcuts;
pub mod state;
pub mod stats;
pub mod storage;
pub mod themes;
pub mod timers;
pub mod window;

use std::io::BufRead;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc::unbounded_channel;

use crate::app::App;
use crate::error::{NoteError, NoteResult};
use crate::events::ChangeEvent;
use crate::filesystem::FileSystem;
use crate::shortcuts::parse_shortcut;
use crate::state::{Modal, View};

/// Prefix of an input line carrying text for the focused field
const TEXT_PREFIX: &str = "text:";

/// Runs the core headless against the user's data directory.
///
/// Each line on stdin is either a shortcut such as `Ctrl+N`, or
/// `text:<content>` for whichever text field has focus (editor, search bar
/// or collection dialog). Change events are logged. The loop ends on the
/// quit shortcut or end of input, flushing everything first.
pub fn run() -> NoteResult<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(|e| NoteError::persistence(format!("Failed to start runtime: {}", e)))?;

    let fs = FileSystem::new()?;
    fs.ensure_directories()?;

    runtime.block_on(async move {
        let (mut app, mut messages) = App::new(Box::new(fs));
        let mut events = app.subscribe();
        app.preload_fonts();

        let (line_tx, mut lines) = unbounded_channel::<String>();
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines().map_while(Result::ok) {
                if line_tx.send(line).is_err() {
                    break;
                }
            }
        });

        loop {
            tokio::select! {
                Some(message) = messages.recv() => {
                    app.dispatch(message);
                }
                line = lines.recv() => match line {
                    Some(line) => handle_line(&mut app, &line),
                    None => {
                        app.quit();
                        break;
                    }
                },
                event = events.recv() => match event {
                    Ok(ChangeEvent::QuitRequested) => break,
                    Ok(event) => log::info!("{:?}", event),
                    Err(RecvError::Lagged(skipped)) => log::warn!("Skipped {} events", skipped),
                    Err(RecvError::Closed) => break,
                },
            }
        }
    });
    Ok(())
}

fn handle_line(app: &mut App, line: &str) {
    let line = line.trim_end_matches(['\r', '\n']);
    if let Some(text) = line.strip_prefix(TEXT_PREFIX) {
        enter_text(app, text);
        return;
    }
    if line.trim().is_empty() {
        return;
    }
    match parse_shortcut(line) {
        Ok(combo) => {
            if !app.handle_key(&combo) {
                log::debug!("{} did nothing", combo);
            }
        }
        Err(e) => log::warn!("{}", e),
    }
}

/// Routes text to the field that has focus.
fn enter_text(app: &mut App, text: &str) {
    let handled = match app.modal() {
        Modal::Search => app.search_text_changed(text),
        Modal::FirstTimeSetup => app.setup_first_collection(text),
        Modal::NewCollection => app.submit_new_collection(text),
        Modal::RenameCollection { .. } => app.submit_rename_collection(text),
        Modal::None if app.view() == View::Editor => app.edit_content(&text.replace("\\n", "\n")),
        _ => false,
    };
    if !handled {
        log::debug!("No text field accepted the input");
    }
}
