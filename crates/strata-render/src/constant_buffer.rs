//! Engine-owned constant buffers with lazily created GPU storage.

use bytemuck::{Pod, Zeroable};

use crate::{
    backend::{BackendResult, RenderBackend2D},
    types::{BufferHandle, BufferKind, WriteMode},
};

/// Vertex stage constants of the standard sprite shader (slot 0).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct VSConstants2D {
    /// Rows of the 2×3 affine `transform × screen` matrix.
    pub transform: [[f32; 4]; 2],
    pub color_mul: [f32; 4],
}

impl Default for VSConstants2D {
    fn default() -> Self {
        Self {
            transform: [[1.0, 0.0, 0.0, 0.0], [0.0, 1.0, 0.0, 0.0]],
            color_mul: [1.0; 4],
        }
    }
}

/// Pixel stage constants of the standard sprite shader (slot 0).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct PSConstants2D {
    pub color_add: [f32; 4],
    pub internal: [f32; 4],
}

/// A `T` mirrored into a GPU constant buffer.
///
/// The GPU buffer is created on the first upload and re-created after
/// [`invalidate`](Self::invalidate). Writes only mark the value dirty; the
/// whole value is uploaded by the next [`update_if_dirty`](Self::update_if_dirty).
#[derive(Debug)]
pub struct ConstantBuffer<T: Pod> {
    data: T,
    handle: Option<BufferHandle>,
    dirty: bool,
}

impl<T: Pod> ConstantBuffer<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            handle: None,
            dirty: true,
        }
    }

    pub fn get(&self) -> &T {
        &self.data
    }

    pub fn set(&mut self, data: T) {
        self.data = data;
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn handle(&self) -> Option<BufferHandle> {
        self.handle
    }

    /// Upload when dirty and return the GPU buffer.
    pub fn update_if_dirty(&mut self, backend: &dyn RenderBackend2D) -> BackendResult<BufferHandle> {
        let handle = match self.handle {
            Some(handle) => handle,
            None => {
                let handle = backend.create_buffer(BufferKind::Constant, std::mem::size_of::<T>() as u64)?;
                self.handle = Some(handle);
                self.dirty = true;
                handle
            }
        };
        if self.dirty {
            backend.write_buffer(handle, 0, bytemuck::bytes_of(&self.data), WriteMode::Discard)?;
            self.dirty = false;
        }
        Ok(handle)
    }

    /// Drop the GPU buffer, keeping the value.
    pub fn invalidate(&mut self) {
        self.handle = None;
        self.dirty = true;
    }
}

impl<T: Pod + Default> Default for ConstantBuffer<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// A user constant buffer: fixed size, GPU storage created on first upload.
#[derive(Debug, Clone)]
pub(crate) struct UserConstantBuffer {
    pub size: usize,
    pub handle: Option<BufferHandle>,
}

impl UserConstantBuffer {
    pub fn new(size: usize) -> Self {
        Self { size, handle: None }
    }

    pub fn upload(&mut self, backend: &dyn RenderBackend2D, data: &[u8]) -> BackendResult<BufferHandle> {
        let handle = match self.handle {
            Some(handle) => handle,
            None => {
                let handle = backend.create_buffer(BufferKind::Constant, self.size as u64)?;
                self.handle = Some(handle);
                handle
            }
        };
        backend.write_buffer(handle, 0, data, WriteMode::Discard)?;
        Ok(handle)
    }
}
