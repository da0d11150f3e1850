//! Mock primary controller.
//!
//! Speaks the device side of the statewire protocol over TCP: answers the
//! handshake, applies change-state and set-value frames to an in-memory
//! store, records fired events and pushes surface value updates to every
//! connected console.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use statewire::console::{tables_from_model, StateTable};
use statewire::decoder::{CommandDecoder, DeviceInput, ValueTable};
use statewire::frame::{encode_value_push, Command};
use statewire::handshake::{ack_reply, hello_reply};
use statewire::{Model, ScalarValue, StatewireError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

const PUSH_CAPACITY: usize = 64;

/// Observable device state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Store {
    pub current_state: u8,
    /// Last value written per (state id, value id).
    pub values: BTreeMap<(u8, u8), ScalarValue>,
    /// Fired events as (state id, event id), oldest first.
    pub events: Vec<(u8, u8)>,
}

struct Inner {
    build_id: u32,
    tables: Vec<StateTable>,
    store: Mutex<Store>,
    pushes: broadcast::Sender<Vec<u8>>,
}

#[derive(Clone)]
pub struct MockController {
    inner: Arc<Inner>,
}

/// Primary value table indexed by state id, for the command decoder.
fn command_table(tables: &[StateTable]) -> ValueTable {
    let len = tables.iter().map(|t| usize::from(t.id) + 1).max().unwrap_or(0);
    let mut out: ValueTable = vec![Vec::new(); len];
    for t in tables {
        out[usize::from(t.id)].clone_from(&t.primary.values);
    }
    out
}

impl MockController {
    #[must_use]
    pub fn new(tables: Vec<StateTable>, build_id: u32, initial_state: u8) -> Self {
        let (pushes, _) = broadcast::channel(PUSH_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                build_id,
                tables,
                store: Mutex::new(Store {
                    current_state: initial_state,
                    ..Store::default()
                }),
                pushes,
            }),
        }
    }

    /// Controller for every state of `model`, starting in its first state.
    /// `build_id` overrides the model's own BuildId.
    pub fn from_model(model: &Model, build_id: Option<u32>) -> Result<Self, StatewireError> {
        let tables = tables_from_model(model)?;
        let initial = tables.first().map_or(0, |t| t.id);
        Ok(Self::new(
            tables,
            build_id.unwrap_or_else(|| statewire::build_id(model)),
            initial,
        ))
    }

    /// Switch to the state named `name` as if the firmware had changed it.
    pub fn set_state(&self, name: &str) -> Result<(), StatewireError> {
        let id = self
            .inner
            .tables
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.id)
            .ok_or_else(|| StatewireError::Command(format!("no state named {name:?}")))?;
        self.store().current_state = id;
        Ok(())
    }

    fn store(&self) -> MutexGuard<'_, Store> {
        self.inner
            .store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn build_id(&self) -> u32 {
        self.inner.build_id
    }

    #[must_use]
    pub fn snapshot(&self) -> Store {
        self.store().clone()
    }

    #[must_use]
    pub fn current_state(&self) -> u8 {
        self.store().current_state
    }

    fn table(&self, state: u8) -> Option<&StateTable> {
        self.inner.tables.iter().find(|t| t.id == state)
    }

    /// Push surface value `name` of the current state to every console.
    /// Returns how many consoles received it.
    pub fn push_value(&self, name: &str, value: ScalarValue) -> Result<usize, StatewireError> {
        let state = self.current_state();
        let table = self
            .table(state)
            .ok_or_else(|| StatewireError::Protocol(format!("unknown state id {state}")))?;
        let (id, ty) = table.surface.value(name).ok_or_else(|| {
            StatewireError::Command(format!("no surface value {name:?} in {}", table.name))
        })?;
        let frame = encode_value_push(state, id, &ty.encode(value)?);
        tracing::info!(state = %table.name, name, %value, "pushing value");
        Ok(self.inner.pushes.send(frame).unwrap_or(0))
    }

    /// Like [`push_value`](Self::push_value), parsing `text` with the
    /// value's declared type.
    pub fn push_text(&self, name: &str, text: &str) -> Result<usize, StatewireError> {
        let state = self.current_state();
        let ty = self
            .table(state)
            .and_then(|t| t.surface.value(name))
            .map(|(_, ty)| ty)
            .ok_or_else(|| StatewireError::Command(format!("no surface value {name:?}")))?;
        self.push_value(name, ty.parse_text(text)?)
    }

    /// Apply one decoded input; returns the bytes to send back, if any.
    fn apply(&self, input: DeviceInput) -> Option<Vec<u8>> {
        match input {
            DeviceInput::Hello => Some(hello_reply(self.inner.build_id).to_vec()),
            DeviceInput::Ack => Some(ack_reply(self.current_state()).to_vec()),
            DeviceInput::Command(Command::ChangeState { state }) => {
                match self.table(state) {
                    Some(table) => {
                        tracing::info!(state = %table.name, "state changed");
                        self.store().current_state = state;
                    }
                    None => tracing::warn!(state, "change to unknown state ignored"),
                }
                None
            }
            DeviceInput::Command(Command::FireEvent { state, event }) => {
                let name = self
                    .table(state)
                    .and_then(|t| t.primary.events.get(usize::from(event)))
                    .cloned()
                    .unwrap_or_else(|| format!("#{event}"));
                tracing::info!(state, event = %name, "event fired");
                self.store().events.push((state, event));
                None
            }
            DeviceInput::Command(Command::SetValue {
                state,
                value,
                payload,
            }) => {
                let decoded = self
                    .table(state)
                    .and_then(|t| t.primary.values.get(usize::from(value)))
                    .map(|(name, ty)| (name.clone(), ty.decode(&payload)));
                match decoded {
                    Some((name, Ok(v))) => {
                        tracing::info!(state, name = %name, value = %v, "value set");
                        self.store().values.insert((state, value), v);
                    }
                    Some((name, Err(e))) => tracing::warn!(name = %name, "bad payload: {e}"),
                    None => tracing::warn!(state, value, "set of unknown value ignored"),
                }
                None
            }
        }
    }

    /// Accept consoles on `listener` until it fails.
    pub async fn run_listener_on(&self, listener: TcpListener) -> anyhow::Result<()> {
        tracing::info!("mock controller listening on {}", listener.local_addr()?);
        loop {
            let (stream, peer) = listener.accept().await?;
            tracing::info!(%peer, "console connected");
            let this = self.clone();
            tokio::spawn(async move {
                if let Err(e) = this.handle_conn(stream).await {
                    tracing::debug!(%peer, "connection ended: {e}");
                }
                tracing::info!(%peer, "console disconnected");
            });
        }
    }

    async fn handle_conn(&self, stream: TcpStream) -> anyhow::Result<()> {
        stream.set_nodelay(true)?;
        let (mut rd, mut wr) = stream.into_split();
        let mut decoder = CommandDecoder::new(command_table(&self.inner.tables));
        let mut pushes = self.inner.pushes.subscribe();
        let mut buf = [0u8; 256];
        loop {
            tokio::select! {
                read = rd.read(&mut buf) => {
                    let n = read?;
                    if n == 0 {
                        return Ok(());
                    }
                    for &b in &buf[..n] {
                        match decoder.feed(b) {
                            Ok(Some(input)) => {
                                if let Some(reply) = self.apply(input) {
                                    wr.write_all(&reply).await?;
                                }
                            }
                            Ok(None) => {}
                            Err(e) => tracing::warn!("dropping frame: {e}"),
                        }
                    }
                }
                push = pushes.recv() => match push {
                    Ok(frame) => wr.write_all(&frame).await?,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("console lagging; {n} pushes skipped");
                    }
                    Err(broadcast::error::RecvError::Closed) => return Ok(()),
                },
            }
        }
    }
}
