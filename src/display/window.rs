//! Wayland toplevel window presenting a [`PixmapPlot`]

use super::plot::{Axes, PlotSurface};
use super::render::PixmapPlot;
use anyhow::{Result, anyhow};
use smithay_client_toolkit::{
    compositor::{CompositorHandler, CompositorState},
    delegate_compositor, delegate_output, delegate_registry, delegate_shm, delegate_xdg_shell,
    delegate_xdg_window,
    output::{OutputHandler, OutputState},
    registry::{ProvidesRegistryState, RegistryState},
    registry_handlers,
    shell::{
        WaylandSurface,
        xdg::{
            XdgShell,
            window::{Window, WindowConfigure, WindowDecorations, WindowHandler},
        },
    },
    shm::{
        Shm, ShmHandler,
        slot::{Buffer, SlotPool},
    },
};
use std::io;
use wayland_client::{
    Connection, EventQueue, QueueHandle,
    backend::WaylandError,
    globals::registry_queue_init,
    protocol::{wl_output, wl_shm, wl_surface},
};

const MIN_WIDTH: u32 = 320;
const MIN_HEIGHT: u32 = 200;

/// What the window shows: the axes and lines of the current frame
#[derive(Default)]
struct Frame {
    axes: Option<Axes>,
    lines: Vec<(Vec<f32>, Vec<f32>)>,
}

struct WindowState {
    registry_state: RegistryState,
    output_state: OutputState,
    shm: Shm,

    window: Window,
    pool: Option<SlotPool>,
    buffer: Option<Buffer>,
    width: u32,
    height: u32,
    frame: Frame,
    configured: bool,
    exit: bool,
}

/// Interactive plot window
///
/// Keeps the last frame so it can be re-rendered when the compositor resizes
/// the window.
pub struct PlotWindow {
    event_queue: EventQueue<WindowState>,
    state: WindowState,
}

impl PlotWindow {
    pub fn open(title: &str, width: u32, height: u32) -> Result<Self> {
        let conn = Connection::connect_to_env()?;
        let (globals, mut event_queue) = registry_queue_init(&conn)?;
        let qh = event_queue.handle();

        let compositor_state = CompositorState::bind(&globals, &qh)?;
        let xdg_shell = XdgShell::bind(&globals, &qh)?;
        let shm = Shm::bind(&globals, &qh)?;

        let surface = compositor_state.create_surface(&qh);
        let window = xdg_shell.create_window(surface, WindowDecorations::RequestServer, &qh);
        window.set_title(title);
        window.set_app_id("audioscope");
        window.set_min_size(Some((MIN_WIDTH, MIN_HEIGHT)));

        // Commit initial configuration
        window.commit();

        let mut state = WindowState {
            registry_state: RegistryState::new(&globals),
            output_state: OutputState::new(&globals, &qh),
            shm,
            window,
            pool: None,
            buffer: None,
            width: width.max(MIN_WIDTH),
            height: height.max(MIN_HEIGHT),
            frame: Frame::default(),
            configured: false,
            exit: false,
        };

        // Nothing may be attached before the first configure
        while !state.configured && !state.exit {
            event_queue.blocking_dispatch(&mut state)?;
        }

        tracing::info!(width = state.width, height = state.height, "plot window configured");
        Ok(Self { event_queue, state })
    }
}

impl PlotSurface for PlotWindow {
    fn is_open(&mut self) -> Result<bool> {
        self.event_queue.flush()?;

        // Read whatever the compositor sent without blocking
        if let Some(guard) = self.event_queue.prepare_read() {
            match guard.read() {
                Ok(_) => {}
                Err(WaylandError::Io(e)) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(e.into()),
            }
        }
        self.event_queue.dispatch_pending(&mut self.state)?;

        Ok(!self.state.exit)
    }

    fn clear(&mut self, axes: &Axes) {
        self.state.frame = Frame {
            axes: Some(*axes),
            lines: Vec::new(),
        };
    }

    fn draw_line(&mut self, xs: &[f32], ys: &[f32]) {
        self.state.frame.lines.push((xs.to_vec(), ys.to_vec()));
    }

    fn show(&mut self) -> Result<()> {
        self.state.draw()?;
        self.event_queue.flush()?;
        Ok(())
    }
}

impl WindowState {
    fn draw(&mut self) -> Result<()> {
        if !self.configured {
            return Ok(());
        }

        let mut plot = PixmapPlot::new(self.width, self.height)?;
        if let Some(axes) = &self.frame.axes {
            plot.clear(axes);
        }
        for (xs, ys) in &self.frame.lines {
            plot.draw_line(xs, ys);
        }

        let stride = self.width as i32 * 4;
        if self.pool.is_none() {
            self.pool = Some(SlotPool::new((self.width * self.height * 4) as usize, &self.shm)?);
        }
        let pool = self
            .pool
            .as_mut()
            .ok_or_else(|| anyhow!("shm pool unavailable"))?;

        let (buffer, canvas) = pool.create_buffer(
            self.width as i32,
            self.height as i32,
            stride,
            wl_shm::Format::Argb8888,
        )?;

        // tiny-skia is RGBA, little-endian ARGB8888 is BGRA in memory
        for (dst, src) in canvas
            .chunks_exact_mut(4)
            .zip(plot.pixmap().data().chunks_exact(4))
        {
            dst[0] = src[2];
            dst[1] = src[1];
            dst[2] = src[0];
            dst[3] = src[3];
        }

        let surface = self.window.wl_surface();
        surface.attach(Some(buffer.wl_buffer()), 0, 0);
        surface.damage_buffer(0, 0, self.width as i32, self.height as i32);
        surface.commit();

        // Keep the buffer alive until the next frame replaces it
        self.buffer = Some(buffer);
        Ok(())
    }
}

delegate_compositor!(WindowState);
delegate_output!(WindowState);
delegate_shm!(WindowState);
delegate_xdg_shell!(WindowState);
delegate_xdg_window!(WindowState);
delegate_registry!(WindowState);

impl CompositorHandler for WindowState {
    fn scale_factor_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_factor: i32,
    ) {
    }

    fn transform_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_transform: wl_output::Transform,
    ) {
    }

    fn frame(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _time: u32,
    ) {
    }

    fn surface_enter(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _output: &wl_output::WlOutput,
    ) {
    }

    fn surface_leave(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _output: &wl_output::WlOutput,
    ) {
    }
}

impl OutputHandler for WindowState {
    fn output_state(&mut self) -> &mut OutputState {
        &mut self.output_state
    }

    fn new_output(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
    }

    fn update_output(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
    }

    fn output_destroyed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
    }
}

impl WindowHandler for WindowState {
    fn request_close(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _window: &Window) {
        tracing::info!("plot window closed");
        self.exit = true;
    }

    fn configure(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _window: &Window,
        configure: WindowConfigure,
        _serial: u32,
    ) {
        let (width, height) = configure.new_size;
        if let (Some(width), Some(height)) = (width, height) {
            let (width, height) = (width.get().max(MIN_WIDTH), height.get().max(MIN_HEIGHT));
            if (width, height) != (self.width, self.height) {
                tracing::debug!(width, height, "plot window resized");
                self.width = width;
                self.height = height;
                self.pool = None; // Recreate pool with new size
            }
        }

        self.configured = true;
        if let Err(e) = self.draw() {
            tracing::warn!("plot redraw after configure failed: {:#}", e);
        }
    }
}

impl ShmHandler for WindowState {
    fn shm_state(&mut self) -> &mut Shm {
        &mut self.shm
    }
}

impl ProvidesRegistryState for WindowState {
    fn registry(&mut self) -> &mut RegistryState {
        &mut self.registry_state
    }
    registry_handlers![OutputState];
}
