//! Shared-memory presentation
//!
//! A single ARGB8888 buffer backed by an anonymous close-on-exec file in
//! `$XDG_RUNTIME_DIR`, mapped read/write and handed to the compositor through
//! a pool sized to exactly that buffer. There is no back buffer: the
//! compositor may read a frame while the next one is being painted.
//!
//! On every resize the old buffer and pool are destroyed and the backing file
//! is unmapped and closed before the replacement is allocated, so at most one
//! pool and one descriptor are live per window.

use log::{debug, info, warn};
use memmap2::MmapMut;
use std::env;
use std::fs::File;
use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd};
use std::path::{Path, PathBuf};
use wayland_client::protocol::{wl_buffer, wl_shm, wl_shm_pool, wl_surface};
use wayland_client::QueueHandle;

use super::{BackendKind, ChannelLayout, Framebuffer, PresentationBackend};
use crate::error::{Result, ShimError};
use crate::session::SessionState;
use crate::shell::Geometry;

pub const RUNTIME_DIR_VAR: &str = "XDG_RUNTIME_DIR";

/// Pixel format of every buffer this backend allocates
pub const BUFFER_FORMAT: wl_shm::Format = wl_shm::Format::Argb8888;

/// Directory for the anonymous backing files, from `XDG_RUNTIME_DIR`
pub fn runtime_dir_from_env() -> Result<PathBuf> {
    match env::var_os(RUNTIME_DIR_VAR) {
        Some(dir) if !dir.is_empty() => Ok(PathBuf::from(dir)),
        _ => Err(ShimError::MissingRuntimeDir),
    }
}

/// Create an unlinked, close-on-exec file of `len` bytes inside `dir`
pub fn create_anonymous_file(dir: &Path, len: u64) -> Result<File> {
    let file = tempfile::tempfile_in(dir).map_err(|e| {
        ShimError::BufferAllocation(format!(
            "cannot create backing file in {}: {}",
            dir.display(),
            e
        ))
    })?;
    ensure_cloexec(&file)
        .map_err(|e| ShimError::BufferAllocation(format!("cannot set FD_CLOEXEC: {}", e)))?;
    file.set_len(len).map_err(|e| {
        ShimError::BufferAllocation(format!("cannot size backing file to {} bytes: {}", len, e))
    })?;
    Ok(file)
}

/// Reject channel offsets that are not a permutation of the four byte lanes
pub fn check_layout(layout: ChannelLayout) -> Result<()> {
    if layout.is_valid() {
        Ok(())
    } else {
        Err(ShimError::BufferAllocation(format!(
            "invalid channel layout {:?}: offsets must be a permutation of 0..=3",
            layout
        )))
    }
}

fn ensure_cloexec(file: &File) -> io::Result<()> {
    let fd = file.as_raw_fd();
    // SAFETY: fd is owned by `file` and open for the duration of both calls
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    if flags & libc::FD_CLOEXEC == 0 {
        // SAFETY: as above
        if unsafe { libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC) } < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// The protocol requests the shm backend issues
pub trait ShmTransport {
    type Pool;
    type Buffer;

    fn create_pool(&mut self, fd: BorrowedFd<'_>, size: i32) -> Self::Pool;
    fn create_buffer(&mut self, pool: &Self::Pool, geometry: Geometry) -> Self::Buffer;
    fn destroy_buffer(&mut self, buffer: Self::Buffer);
    fn destroy_pool(&mut self, pool: Self::Pool);
    fn attach(&mut self, buffer: &Self::Buffer, x: i32, y: i32);
    fn damage(&mut self, x: i32, y: i32, width: i32, height: i32);
    fn commit(&mut self);
}

/// [`ShmTransport`] over a live connection
pub struct WaylandShm {
    shm: wl_shm::WlShm,
    surface: wl_surface::WlSurface,
    qh: QueueHandle<SessionState>,
}

impl WaylandShm {
    pub fn new(
        shm: wl_shm::WlShm,
        surface: wl_surface::WlSurface,
        qh: QueueHandle<SessionState>,
    ) -> Self {
        Self { shm, surface, qh }
    }
}

impl ShmTransport for WaylandShm {
    type Pool = wl_shm_pool::WlShmPool;
    type Buffer = wl_buffer::WlBuffer;

    fn create_pool(&mut self, fd: BorrowedFd<'_>, size: i32) -> Self::Pool {
        self.shm.create_pool(fd, size, &self.qh, ())
    }

    fn create_buffer(&mut self, pool: &Self::Pool, geometry: Geometry) -> Self::Buffer {
        pool.create_buffer(
            0,
            geometry.width,
            geometry.height,
            geometry.stride(),
            BUFFER_FORMAT,
            &self.qh,
            (),
        )
    }

    fn destroy_buffer(&mut self, buffer: Self::Buffer) {
        buffer.destroy();
    }

    fn destroy_pool(&mut self, pool: Self::Pool) {
        pool.destroy();
    }

    fn attach(&mut self, buffer: &Self::Buffer, x: i32, y: i32) {
        self.surface.attach(Some(buffer), x, y);
    }

    fn damage(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.surface.damage(x, y, width, height);
    }

    fn commit(&mut self) {
        self.surface.commit();
    }
}

struct PixelBuffer<T: ShmTransport> {
    buffer: T::Buffer,
    pool: T::Pool,
    map: MmapMut,
    file: File,
    geometry: Geometry,
}

/// Single-buffered shared-memory backend
pub struct ShmBackend<T: ShmTransport> {
    transport: T,
    runtime_dir: PathBuf,
    layout: ChannelLayout,
    geometry: Geometry,
    current: Option<PixelBuffer<T>>,
    allocations: u64,
    // attach offsets move the surface relative to where it is
    origin_pending: bool,
}

impl<T: ShmTransport> ShmBackend<T> {
    /// No buffer is allocated until the first resize is consumed
    pub fn new(
        transport: T,
        runtime_dir: PathBuf,
        layout: ChannelLayout,
        geometry: Geometry,
    ) -> Self {
        Self {
            transport,
            runtime_dir,
            layout,
            geometry,
            current: None,
            allocations: 0,
            origin_pending: true,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Buffer geometry, if one is allocated
    pub fn buffer_geometry(&self) -> Option<Geometry> {
        self.current.as_ref().map(|buffer| buffer.geometry)
    }

    /// Total number of buffers allocated over the backend's life
    pub fn allocations(&self) -> u64 {
        self.allocations
    }

    /// Replace the pixel buffer with one of `geometry`
    pub fn ensure_buffer(&mut self, geometry: Geometry) -> Result<()> {
        if geometry.width <= 0 || geometry.height <= 0 {
            return Err(ShimError::BufferAllocation(format!(
                "invalid buffer size {}",
                geometry
            )));
        }
        check_layout(self.layout)?;

        // Old pool and descriptor must be gone before the new ones exist
        self.release();

        let len = geometry.byte_len();
        let size = i32::try_from(len).map_err(|_| {
            ShimError::BufferAllocation(format!("buffer of {} bytes exceeds pool limit", len))
        })?;
        let file = create_anonymous_file(&self.runtime_dir, len as u64)?;
        // SAFETY: the file is private to this process until its fd is sent to
        // the compositor, which only reads it
        let map = unsafe { MmapMut::map_mut(&file) }
            .map_err(|e| ShimError::BufferAllocation(format!("mmap failed: {}", e)))?;

        let pool = self.transport.create_pool(file.as_fd(), size);
        let buffer = self.transport.create_buffer(&pool, geometry);

        self.current = Some(PixelBuffer {
            buffer,
            pool,
            map,
            file,
            geometry,
        });
        self.geometry = geometry;
        self.allocations += 1;
        debug!("Allocated {} shm buffer ({} bytes)", geometry, len);
        Ok(())
    }

    /// Attach, damage the whole window, commit. `origin` is applied by the
    /// first attach only; every later attach keeps the surface in place.
    pub fn submit(&mut self, origin: (i32, i32)) {
        let Some(current) = self.current.as_ref() else {
            debug!("No shm buffer allocated yet, skipping submit");
            return;
        };
        let (x, y) = if std::mem::take(&mut self.origin_pending) {
            origin
        } else {
            (0, 0)
        };
        self.transport.attach(&current.buffer, x, y);
        self.transport
            .damage(0, 0, current.geometry.width, current.geometry.height);
        self.transport.commit();
    }

    fn release(&mut self) {
        if let Some(old) = self.current.take() {
            let PixelBuffer {
                buffer,
                pool,
                map,
                file,
                ..
            } = old;
            self.transport.destroy_buffer(buffer);
            self.transport.destroy_pool(pool);
            drop(map);
            drop(file);
        }
    }
}

impl<T: ShmTransport> PresentationBackend for ShmBackend<T> {
    fn kind(&self) -> BackendKind {
        BackendKind::Shm
    }

    fn on_resize(&mut self, geometry: Geometry) -> Result<()> {
        self.ensure_buffer(geometry)
    }

    fn present(&mut self, origin: (i32, i32)) -> Result<()> {
        self.submit(origin);
        Ok(())
    }

    fn framebuffer(&mut self) -> Option<Framebuffer<'_>> {
        let layout = self.layout;
        self.current
            .as_mut()
            .map(|buffer| Framebuffer::new(&mut buffer.map[..], buffer.geometry, layout))
    }
}

impl<T: ShmTransport> Drop for ShmBackend<T> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Shm backend for a live window
pub fn create(
    shm: wl_shm::WlShm,
    surface: wl_surface::WlSurface,
    qh: QueueHandle<SessionState>,
    formats: &[wl_shm::Format],
    layout: ChannelLayout,
    geometry: Geometry,
) -> Result<ShmBackend<WaylandShm>> {
    check_layout(layout)?;
    let runtime_dir = runtime_dir_from_env()?;
    if !formats.contains(&BUFFER_FORMAT) {
        warn!("Compositor did not advertise {:?}; using it anyway", BUFFER_FORMAT);
    }
    info!(
        "🧱 Shared-memory backend ready (backing files in {})",
        runtime_dir.display()
    );
    Ok(ShmBackend::new(
        WaylandShm::new(shm, surface, qh),
        runtime_dir,
        layout,
        geometry,
    ))
}
