//! The drawing board: canvas state, renderer, pointer input and the
//! connection, wired together.

use kurbo::{Point, Size};
use sketchwire_core::{
    CanvasEvent, CanvasState, CollaborationManager, CoordinateMapper, Dispatch, Inbound, Intent,
    Notification, PointerEvent, PointerTracker, ToolSettings, Transport, TransportError,
};
use sketchwire_render::{RasterRenderer, RenderConfig, RenderMode, Renderer, RendererError, encode_png};
use std::path::Path;
use thiserror::Error;

/// Board errors.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("render error: {0}")]
    Render(#[from] RendererError),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for board operations.
pub type BoardResult<T> = Result<T, BoardError>;

/// One client's view of a shared canvas.
///
/// All state changes go through [`Board::dispatch`] or [`Board::pump`] on the
/// owning thread, so the reducer only ever sees one event at a time.
pub struct Board<T: Transport> {
    state: CanvasState,
    renderer: RasterRenderer,
    mapper: CoordinateMapper,
    tracker: PointerTracker,
    collab: CollaborationManager,
    transport: T,
    /// Room URL of the current session; reconnecting to it resyncs.
    session_url: Option<String>,
    notifications: Vec<Notification>,
    /// Incremented whenever the rendered pixels change.
    revision: u64,
}

impl<T: Transport> Board<T> {
    pub fn new(transport: T, mapper: CoordinateMapper, config: RenderConfig) -> BoardResult<Self> {
        let (width, height) = mapper.buffer_pixels();
        let mut board = Self {
            state: CanvasState::new(),
            renderer: RasterRenderer::new(width, height, config)?,
            mapper,
            tracker: PointerTracker::default(),
            collab: CollaborationManager::new(),
            transport,
            session_url: None,
            notifications: Vec::new(),
            revision: 0,
        };
        board.render();
        Ok(board)
    }

    pub fn state(&self) -> &CanvasState {
        &self.state
    }

    pub fn renderer(&self) -> &RasterRenderer {
        &self.renderer
    }

    pub fn mapper(&self) -> &CoordinateMapper {
        &self.mapper
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn tool_settings(&self) -> &ToolSettings {
        &self.tracker.settings
    }

    pub fn tool_settings_mut(&mut self) -> &mut ToolSettings {
        &mut self.tracker.settings
    }

    /// Bumped each time the rendered pixels change.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Take connection notifications gathered since the last call.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    /// The canvas element moved or changed size. Reallocates the buffer and
    /// replays every element.
    pub fn resize(&mut self, origin: Point, display_size: Size) -> BoardResult<()> {
        let mapper = CoordinateMapper::new(origin, display_size);
        let (width, height) = mapper.buffer_pixels();
        self.renderer.resize(width, height)?;
        self.mapper = mapper;
        self.render();
        Ok(())
    }

    pub fn pointer_down(&mut self, client: Point) -> RenderMode {
        let point = self.mapper.to_buffer(client);
        self.pointer(PointerEvent::Down(point))
    }

    pub fn pointer_move(&mut self, client: Point) -> RenderMode {
        let point = self.mapper.to_buffer(client);
        self.pointer(PointerEvent::Move(point))
    }

    pub fn pointer_up(&mut self, client: Point) -> RenderMode {
        let point = self.mapper.to_buffer(client);
        self.pointer(PointerEvent::Up(point))
    }

    pub fn pointer_leave(&mut self) -> RenderMode {
        self.pointer(PointerEvent::Leave)
    }

    fn pointer(&mut self, event: PointerEvent) -> RenderMode {
        let intents = self
            .tracker
            .handle(event, self.mapper.buffer_size, self.mapper.scale().x);
        let mut mode = RenderMode::Unchanged;
        for intent in intents {
            let step = match intent {
                Intent::Event(event) => self.dispatch(Dispatch::local(event)),
                Intent::Fill { color, seed } => {
                    if self.renderer.fill_would_change(seed, color) {
                        self.dispatch(Dispatch::local(CanvasEvent::NewFill { color, seed }))
                    } else {
                        log::debug!("bucket at ({:.1}, {:.1}) already {color}", seed.x, seed.y);
                        RenderMode::Unchanged
                    }
                }
            };
            if step != RenderMode::Unchanged {
                mode = step;
            }
        }
        mode
    }

    pub fn undo(&mut self) -> RenderMode {
        self.dispatch(Dispatch::local(CanvasEvent::Undo))
    }

    pub fn clear(&mut self) -> RenderMode {
        self.dispatch(Dispatch::local(CanvasEvent::Clear))
    }

    /// Connect to `url`. Connecting to the same URL again counts as a
    /// reconnect and requests a snapshot; a different URL starts a fresh
    /// session.
    pub fn connect(&mut self, url: &str) -> BoardResult<()> {
        if self.session_url.as_deref() != Some(url) {
            self.collab.reset();
        }
        self.transport.connect(url)?;
        self.session_url = Some(url.to_string());
        log::info!("connecting to {url}");
        Ok(())
    }

    pub fn disconnect(&mut self) {
        self.transport.disconnect();
    }

    /// Apply one event, send it if the server has not seen it, and render.
    pub fn dispatch(&mut self, dispatch: Dispatch) -> RenderMode {
        if !self.state.apply(&dispatch.event) {
            log::trace!("{} left the canvas unchanged", dispatch.event.name());
        }
        self.collab.queue_local(&dispatch);
        self.flush_outgoing();
        self.render()
    }

    /// Drain the transport, apply inbound events in arrival order and render.
    pub fn pump(&mut self) -> RenderMode {
        let events = self.transport.poll_events();
        if events.is_empty() {
            return RenderMode::Unchanged;
        }
        for event in events {
            for inbound in self.collab.handle_transport_event(event) {
                match inbound {
                    Inbound::Dispatch(dispatch) => {
                        self.state.apply(&dispatch.event);
                    }
                    Inbound::Notify(notification) => self.notifications.push(notification),
                }
            }
        }
        self.flush_outgoing();
        self.render()
    }

    fn flush_outgoing(&mut self) {
        for message in self.collab.take_outgoing() {
            if !self.transport.is_connected() {
                log::debug!("offline, not sending {}", message.encode());
                continue;
            }
            if let Err(e) = self.transport.send(&message) {
                log::warn!("failed to send message: {e}");
            }
        }
    }

    fn render(&mut self) -> RenderMode {
        let mode = self.renderer.render(&self.state);
        if mode != RenderMode::Unchanged {
            self.revision += 1;
        }
        mode
    }

    /// PNG bytes of the current render.
    pub fn png(&self) -> BoardResult<Vec<u8>> {
        Ok(encode_png(self.renderer.surface())?)
    }

    /// Write the current render to `path` as PNG.
    pub fn export_png(&self, path: impl AsRef<Path>) -> BoardResult<()> {
        let path = path.as_ref();
        std::fs::write(path, self.png()?)?;
        log::info!("wrote {}", path.display());
        Ok(())
    }
}
