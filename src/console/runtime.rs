//! Console runtime: the interactive loop and the background reader.
//!
//! The main thread owns line editing and issues commands. A reader thread
//! decodes value pushes from a cloned transport handle and prints them.
//! One mutex (around the [`Session`]) serializes the two: it is held for a
//! whole command and while one update is taken. It is released before the
//! line goes to the printer, which may block until the editor drains it.
//! On quit the reader is told to stop through a channel and joined; it
//! polls the channel between reads.

use std::io::{Read, Write};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, ExternalPrinter, Helper};

use super::automated::TestRegistry;
use super::session::{Commander, Session};
use super::tables::{push_table, StateTable};
use crate::config::{config as global_config, maybe_log_frame};
use crate::decoder::PushDecoder;
use crate::error::StatewireError;
use crate::handshake::handshake;
use crate::transport::{is_timeout, Transport};

const READ_CHUNK: usize = 64;

pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Where decoded updates are printed.
pub trait UpdatePrinter {
    fn print_update(&mut self, line: String);
}

/// Prints above the line being edited and redraws it.
pub struct EditorPrinter<P: ExternalPrinter>(pub P);

impl<P: ExternalPrinter> UpdatePrinter for EditorPrinter<P> {
    fn print_update(&mut self, line: String) {
        if let Err(e) = self.0.print(line) {
            log::debug!("external printer failed: {e}");
        }
    }
}

impl UpdatePrinter for Sender<String> {
    fn print_update(&mut self, line: String) {
        let _ = self.send(line);
    }
}

/// Handle on a running reader thread.
pub struct ReaderHandle {
    shutdown: Sender<()>,
    handle: JoinHandle<()>,
}

impl ReaderHandle {
    /// Ask the reader to stop and wait for it.
    pub fn stop(self) {
        drop(self.shutdown);
        if self.handle.join().is_err() {
            log::warn!("reader thread panicked");
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Spawn the reader. `input` must have a read timeout so the thread can
/// observe shutdown; `surface` is the lock shared with the command loop.
pub fn spawn_reader<R, T, P>(
    input: R,
    decoder: PushDecoder,
    surface: Arc<Mutex<T>>,
    printer: P,
) -> Result<ReaderHandle, StatewireError>
where
    R: Read + Send + 'static,
    T: Send + 'static,
    P: UpdatePrinter + Send + 'static,
{
    let (shutdown, stop_rx) = mpsc::channel();
    let handle = std::thread::Builder::new()
        .name("statewire-reader".into())
        .spawn(move || read_loop(input, decoder, &surface, printer, &stop_rx))?;
    Ok(ReaderHandle { shutdown, handle })
}

fn read_loop<R: Read, T, P: UpdatePrinter>(
    mut input: R,
    mut decoder: PushDecoder,
    surface: &Mutex<T>,
    mut printer: P,
    stop: &Receiver<()>,
) {
    let mut buf = [0u8; READ_CHUNK];
    loop {
        match stop.try_recv() {
            Err(TryRecvError::Empty) => {}
            Ok(()) | Err(TryRecvError::Disconnected) => {
                log::debug!("reader shutting down");
                return;
            }
        }
        let n = match input.read(&mut buf) {
            Ok(0) => {
                log::debug!("transport closed; live updates stopped");
                return;
            }
            Ok(n) => n,
            Err(e) if is_timeout(&e) => continue,
            Err(e) => {
                log::debug!("transport read failed, live updates stopped: {e}");
                return;
            }
        };
        maybe_log_frame("recv", &buf[..n]);
        for update in decoder.feed_all(&buf[..n]) {
            let line = {
                let _surface = lock(surface);
                format!("{} = {}", update.name, update.value)
            };
            printer.print_update(line);
        }
    }
}

struct ConsoleHelper<W: Write> {
    session: Arc<Mutex<Session<W>>>,
}

impl<W: Write> Completer for ConsoleHelper<W> {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let (start, words) = lock(&self.session).complete(line, pos);
        let pairs = words
            .into_iter()
            .map(|w| Pair {
                display: w.clone(),
                replacement: w,
            })
            .collect();
        Ok((start, pairs))
    }
}

impl<W: Write> Hinter for ConsoleHelper<W> {
    type Hint = String;
}

impl<W: Write> Highlighter for ConsoleHelper<W> {}

impl<W: Write> Validator for ConsoleHelper<W> {}

impl<W: Write> Helper for ConsoleHelper<W> {}

fn editor_error(e: &ReadlineError) -> StatewireError {
    StatewireError::Io(std::io::Error::other(e.to_string()))
}

/// Handshake over `transport`, then run the interactive console until quit.
pub fn run_console(
    mut transport: Transport,
    tables: Vec<StateTable>,
    build_id: u32,
    tests: TestRegistry,
) -> Result<(), StatewireError> {
    transport.set_read_timeout(None)?;
    let state = handshake(&mut transport, build_id)?;

    let mut reader_io = transport.try_clone()?;
    reader_io.set_read_timeout(Some(Duration::from_millis(global_config().reader_poll_ms)))?;
    let decoder = PushDecoder::new(push_table(&tables));
    let session = Arc::new(Mutex::new(Session::new(
        Commander::new(tables, state, transport)?,
        tests,
    )));

    let mut editor: Editor<ConsoleHelper<Transport>, DefaultHistory> =
        Editor::new().map_err(|e| editor_error(&e))?;
    editor.set_helper(Some(ConsoleHelper {
        session: Arc::clone(&session),
    }));
    let printer = editor
        .create_external_printer()
        .map_err(|e| editor_error(&e))?;
    let reader = spawn_reader(reader_io, decoder, Arc::clone(&session), EditorPrinter(printer))?;

    println!("try \"help\" for help");
    let result = command_loop(&mut editor, &session);
    reader.stop();
    result
}

fn command_loop(
    editor: &mut Editor<ConsoleHelper<Transport>, DefaultHistory>,
    session: &Mutex<Session<Transport>>,
) -> Result<(), StatewireError> {
    loop {
        let prompt = lock(session).prompt();
        let line = match editor.readline(&prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => return Ok(()),
            Err(e) => return Err(editor_error(&e)),
        };
        if !line.trim().is_empty() {
            let _ = editor.add_history_entry(line.as_str());
        }
        let mut guard = lock(session);
        let reply = guard.execute(&line);
        for out in &reply.lines {
            println!("{out}");
        }
        drop(guard);
        if reply.quit {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::ScalarType;
    use std::io;

    /// Yields the scripted chunks, then times out until dropped.
    struct ScriptedInput {
        chunks: Vec<Vec<u8>>,
        fail_after: bool,
    }

    impl Read for ScriptedInput {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.chunks.is_empty() {
                std::thread::sleep(Duration::from_millis(5));
                if self.fail_after {
                    return Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
                }
                return Err(io::Error::new(io::ErrorKind::TimedOut, "poll"));
            }
            let chunk = self.chunks.remove(0);
            buf[..chunk.len()].copy_from_slice(&chunk);
            Ok(chunk.len())
        }
    }

    fn decoder() -> PushDecoder {
        let tables = vec![
            StateTable::new("IDLE", 0),
            StateTable::new("RUN", 1).surface_value("level", ScalarType::Uint16),
        ];
        PushDecoder::new(push_table(&tables))
    }

    #[test]
    fn reader_prints_updates_split_across_reads() {
        let (tx, rx) = mpsc::channel();
        let input = ScriptedInput {
            chunks: vec![vec![0x02, 1], vec![0], vec![0x34, 0x12, 0xff]],
            fail_after: false,
        };
        let reader =
            spawn_reader(input, decoder(), Arc::new(Mutex::new(())), tx).expect("spawn");
        let line = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("decoded update");
        assert_eq!(line, "level = 4660");
        reader.stop();
    }

    #[test]
    fn read_fault_ends_reader_quietly() {
        let (tx, rx) = mpsc::channel::<String>();
        let input = ScriptedInput {
            chunks: Vec::new(),
            fail_after: true,
        };
        let reader = spawn_reader(input, decoder(), Arc::new(Mutex::new(())), tx).expect("spawn");
        for _ in 0..200 {
            if reader.is_finished() {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(reader.is_finished());
        assert!(rx.try_recv().is_err());
        reader.stop();
    }

    /// Blocks once its single slot is full, like an editor that is busy.
    struct BlockingPrinter(mpsc::SyncSender<String>);

    impl UpdatePrinter for BlockingPrinter {
        fn print_update(&mut self, line: String) {
            let _ = self.0.send(line);
        }
    }

    #[test]
    fn completion_is_not_blocked_by_a_stalled_printer() {
        let tables = vec![
            StateTable::new("IDLE", 0),
            StateTable::new("RUN", 1).surface_value("level", ScalarType::Uint16),
        ];
        let session = Arc::new(Mutex::new(Session::new(
            Commander::new(tables, 0, Vec::<u8>::new()).expect("commander"),
            TestRegistry::new(),
        )));
        let (tx, rx) = mpsc::sync_channel::<String>(1);
        let input = ScriptedInput {
            chunks: vec![vec![0x02, 1, 0, 1, 0], vec![0x02, 1, 0, 2, 0]],
            fail_after: false,
        };
        let reader = spawn_reader(input, decoder(), Arc::clone(&session), BlockingPrinter(tx))
            .expect("spawn");
        // first update fills the slot, the second one stalls the reader
        std::thread::sleep(Duration::from_millis(100));

        let (done_tx, done_rx) = mpsc::channel();
        let shared = Arc::clone(&session);
        std::thread::spawn(move || {
            let _ = done_tx.send(lock(&shared).complete("st", 2));
        });
        let (start, words) = done_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("completion returned");
        assert_eq!(start, 0);
        assert!(words.contains(&"state".to_string()), "{words:?}");

        assert_eq!(rx.recv().expect("first update"), "level = 1");
        assert_eq!(rx.recv().expect("second update"), "level = 2");
        reader.stop();
    }

    #[test]
    fn stop_joins_an_idle_reader() {
        let (tx, _rx) = mpsc::channel::<String>();
        let input = ScriptedInput {
            chunks: Vec::new(),
            fail_after: false,
        };
        let reader = spawn_reader(input, decoder(), Arc::new(Mutex::new(())), tx).expect("spawn");
        assert!(!reader.is_finished());
        reader.stop();
    }
}
