//! Host binary: wires the Orchestrator and UI reducer together over a plain
//! terminal loop, then hands off through the Runner. The rich, styled
//! rendering and subcommand dispatch a packaged CLI would have are out of
//! scope here — this loop only proves out the reducer/runner contract with a
//! minimal, line-oriented display.

use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;

use wtx::config::Config;
use wtx::git::Repository;
use wtx::lock::LockManager;
use wtx::orchestrator::Orchestrator;
use wtx::runner::{self, Handoff};
use wtx::ui::{Command, Key, Mode, Msg, State};
use wtx::worktree::WorktreeManager;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

fn main() {
    #[cfg(feature = "cli")]
    wtx::config::init_logging();

    match run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("wtx: {e:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> anyhow::Result<i32> {
    let _config = Config::load()?;
    let repo = Repository::current()?;
    let locks = LockManager::new()?;
    let worktrees = WorktreeManager::new(repo, locks);
    let orchestrator = Orchestrator::new(worktrees);
    let locks_for_runner = LockManager::new()?;

    let cwd = std::env::current_dir()?;
    let status = orchestrator.status(cwd.clone());
    let mut state = State::new(status);

    terminal::enable_raw_mode()?;
    let handoff = event_loop(&orchestrator, &mut state, &cwd);
    terminal::disable_raw_mode()?;

    runner::run(handoff?, &locks_for_runner)
}

fn event_loop(orchestrator: &Orchestrator, state: &mut State, cwd: &PathBuf) -> anyhow::Result<Handoff> {
    let mut last_poll = Instant::now();
    render(state);

    loop {
        if state.should_quit {
            return Ok(finalize_handoff(state));
        }

        let timeout = POLL_INTERVAL.saturating_sub(last_poll.elapsed());
        if event::poll(timeout)? {
            if let Event::Key(key_event) = event::read()?
                && key_event.kind == KeyEventKind::Press
            {
                let msg = translate_key(key_event.code, key_event.modifiers);
                if let Some(msg) = msg {
                    dispatch(orchestrator, state, msg, cwd)?;
                    render(state);
                }
            }
        }

        if last_poll.elapsed() >= POLL_INTERVAL {
            dispatch(orchestrator, state, Msg::PollTick, cwd)?;
            last_poll = Instant::now();
            render(state);
        }
    }
}

/// Run a message through the reducer, then execute any emitted command
/// synchronously (the host has no background command plane in this minimal
/// loop — every command completes before the next key is read).
fn dispatch(
    orchestrator: &Orchestrator,
    state: &mut State,
    msg: Msg,
    cwd: &PathBuf,
) -> anyhow::Result<()> {
    let cmd = state.update(msg);
    let Some(cmd) = cmd else { return Ok(()) };

    match cmd {
        Command::FetchStatus => {
            let status = orchestrator.status(cwd.clone());
            state.update(Msg::Status(status));
        }
        Command::FetchGhData { repo_root, key, branches, force } => {
            match orchestrator.pr_data_for_branches(&repo_root, &branches, force) {
                Ok(by_branch) => {
                    let prs = orchestrator.prs_for_status(&state.status, force).unwrap_or_default();
                    state.update(Msg::GhData { repo_root, key, by_branch, prs, err: None });
                }
                Err(e) => {
                    state.update(Msg::GhData {
                        repo_root,
                        key,
                        by_branch: Default::default(),
                        prs: Vec::new(),
                        err: Some(e),
                    });
                }
            }
        }
        Command::CreateNewBranch { branch, base_ref } => {
            match orchestrator.worktrees.create_new_branch(&branch, &base_ref) {
                Ok(Ok((info, lock))) => {
                    state.held_lock = Some(lock);
                    state.update(Msg::CreateDone { info: Some(info), err: None });
                }
                Ok(Err(busy)) => {
                    state.update(Msg::CreateDone {
                        info: None,
                        err: Some(format!("worktree busy: held by pid {}", busy.holder_pid)),
                    });
                }
                Err(e) => {
                    state.update(Msg::CreateDone { info: None, err: Some(e.to_string()) });
                }
            }
        }
        Command::OpenUrl(url) => {
            runner::run(Handoff::OpenUrl(url), &LockManager::new()?)?;
        }
        Command::Quit => {}
    }
    Ok(())
}

fn finalize_handoff(state: &mut State) -> Handoff {
    if let Some(path) = state.pending.path.take() {
        Handoff::Shell {
            path,
            branch: state.pending.branch.take(),
            lock: state.held_lock.take(),
        }
    } else {
        Handoff::Quit
    }
}

fn translate_key(code: KeyCode, modifiers: KeyModifiers) -> Option<Msg> {
    let key = match code {
        KeyCode::Up => Key::Up,
        KeyCode::Down => Key::Down,
        KeyCode::Left => Key::Left,
        KeyCode::Right => Key::Right,
        KeyCode::Enter => Key::Enter,
        KeyCode::Esc => Key::Escape,
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => Key::CtrlC,
        KeyCode::Char(c) => Key::Char(c),
        _ => return None,
    };
    Some(Msg::Key(key))
}

/// Minimal, unstyled rendering: one line per worktree plus the mode/cursor.
/// The real terminal UI (styling, selection highlight, spinners) lives
/// outside this core and is not reimplemented here.
fn render(state: &State) {
    let mut out = std::io::stdout();
    let _ = write!(out, "\r\n--- wtx ({:?}) ---\r\n", state.page);
    for (i, entry) in state.status.worktrees.iter().enumerate() {
        let marker = if i == state.worktree_cursor { ">" } else { " " };
        let branch = entry.info.branch.as_deref().unwrap_or("(detached)");
        let lock = if entry.available { "" } else { " [locked]" };
        let _ = write!(out, "{marker} {} {}{}\r\n", entry.info.path.display(), branch, lock);
    }
    let new_marker = if state.worktree_cursor == state.status.worktrees.len() { ">" } else { " " };
    let _ = write!(out, "{new_marker} + New worktree\r\n");
    if let Some(err) = &state.err_msg {
        let _ = write!(out, "error: {err}\r\n");
    }
    if !matches!(state.mode, Mode::List) {
        let _ = write!(out, "mode: {:?}\r\n", state.mode);
    }
    let _ = out.flush();
}
