//! CPU-side vertex/index accumulation split into physical batches, and the
//! upload of one batch into the GPU ring buffers.

use strata_core::profiling::profile_function;

use crate::{
    backend::{BackendResult, RenderBackend2D},
    config::Renderer2DConfig,
    error::BackendError,
    types::{BufferHandle, BufferKind, WriteMode},
    vertex::{Vertex2D, Vertex2DIndex},
};

/// Where a batch landed in the GPU ring buffers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchInfo {
    pub index_count: u32,
    pub start_index_location: u32,
    pub base_vertex_location: u32,
}

/// Writable space handed out by [`Vertex2DBatch::request_buffer`].
///
/// The caller fills every element of both slices. Index values are relative to
/// the batch, so each local index must be offset by `index_offset`.
#[derive(Debug)]
pub struct BufferRegion<'a> {
    pub vertices: &'a mut [Vertex2D],
    pub indices: &'a mut [Vertex2DIndex],
    pub index_offset: Vertex2DIndex,
    /// Physical batch the region belongs to.
    pub batch_index: u32,
}

#[derive(Debug, Clone, Copy, Default)]
struct BatchBufferPos {
    vertex_start: usize,
    vertex_count: u32,
    index_start: usize,
    index_count: u32,
}

impl BatchBufferPos {
    fn is_empty(&self) -> bool {
        self.vertex_count == 0 && self.index_count == 0
    }
}

#[derive(Debug, Clone, Copy)]
struct RingBuffers {
    vertices: BufferHandle,
    indices: BufferHandle,
}

/// Index writes start on 4-byte boundaries so backends can copy them as words.
const INDEX_ALIGN: u32 = (4 / std::mem::size_of::<Vertex2DIndex>()) as u32;

/// Ring write cursor, in elements.
#[derive(Debug, Clone, Copy, Default)]
struct RingCursor {
    pos: u32,
}

impl RingCursor {
    /// Reserve `count` elements of a `capacity` sized ring, wrapping to the
    /// start (and discarding) when the tail is too short. The cursor is left
    /// on a multiple of `align`.
    fn reserve(&mut self, count: u32, capacity: u32, align: u32) -> (u32, WriteMode) {
        let mode = if self.pos + count > capacity {
            self.pos = 0;
            WriteMode::Discard
        } else {
            WriteMode::NoOverwrite
        };
        let start = self.pos;
        self.pos = (self.pos + count).next_multiple_of(align);
        (start, mode)
    }
}

pub struct Vertex2DBatch {
    vertices: Vec<Vertex2D>,
    indices: Vec<Vertex2DIndex>,
    batches: Vec<BatchBufferPos>,
    max_vertices: u32,
    max_indices: u32,
    ring: Option<RingBuffers>,
    vertex_cursor: RingCursor,
    index_cursor: RingCursor,
}

impl Vertex2DBatch {
    pub fn new(config: &Renderer2DConfig) -> Self {
        Self {
            vertices: Vec::with_capacity(config.initial_vertex_array_size as usize),
            indices: Vec::with_capacity(config.initial_index_array_size as usize),
            batches: vec![BatchBufferPos::default()],
            max_vertices: config.max_batch_vertices,
            max_indices: config.max_batch_indices,
            ring: None,
            vertex_cursor: RingCursor::default(),
            index_cursor: RingCursor::default(),
        }
    }

    pub fn max_vertices(&self) -> u32 {
        self.max_vertices
    }

    pub fn max_indices(&self) -> u32 {
        self.max_indices
    }

    /// Reserve room for one submission.
    ///
    /// Starts a new physical batch when the current one lacks room. Returns
    /// `None` when the request can never fit a batch.
    pub fn request_buffer(&mut self, vertex_count: u32, index_count: u32) -> Option<BufferRegion<'_>> {
        profile_function!();
        if vertex_count > self.max_vertices || index_count > self.max_indices {
            tracing::warn!(
                "Dropping draw of {} vertices / {} indices: batch capacity is {} / {}",
                vertex_count,
                index_count,
                self.max_vertices,
                self.max_indices
            );
            return None;
        }

        let vertex_start = self.vertices.len();
        let index_start = self.indices.len();

        let mut current = *self.batches.last()?;
        if current.vertex_count + vertex_count > self.max_vertices
            || current.index_count + index_count > self.max_indices
        {
            current = BatchBufferPos {
                vertex_start,
                vertex_count: 0,
                index_start,
                index_count: 0,
            };
            self.batches.push(current);
        }

        let batch_index = (self.batches.len() - 1) as u32;
        let index_offset = current.vertex_count as Vertex2DIndex;
        if let Some(last) = self.batches.last_mut() {
            last.vertex_count += vertex_count;
            last.index_count += index_count;
        }

        grow(&mut self.vertices, vertex_count as usize);
        grow(&mut self.indices, index_count as usize);

        Some(BufferRegion {
            vertices: &mut self.vertices[vertex_start..],
            indices: &mut self.indices[index_start..],
            index_offset,
            batch_index,
        })
    }

    /// Batches holding data.
    pub fn num_batches(&self) -> usize {
        match self.batches.as_slice() {
            [only] if only.is_empty() => 0,
            batches => batches.len(),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Vertices and indices recorded for `batch_index`.
    pub fn batch_contents(&self, batch_index: u32) -> Option<(&[Vertex2D], &[Vertex2DIndex])> {
        let pos = self.batches.get(batch_index as usize)?;
        let vertices = &self.vertices[pos.vertex_start..pos.vertex_start + pos.vertex_count as usize];
        let indices = &self.indices[pos.index_start..pos.index_start + pos.index_count as usize];
        Some((vertices, indices))
    }

    /// Clear recorded geometry. Array capacity is kept.
    pub fn reset(&mut self) {
        self.vertices.clear();
        self.indices.clear();
        self.batches.clear();
        self.batches.push(BatchBufferPos::default());
    }

    /// Forget GPU buffers after device loss; they are recreated on next upload.
    pub fn invalidate_gpu_buffers(&mut self) {
        self.ring = None;
        self.vertex_cursor = RingCursor::default();
        self.index_cursor = RingCursor::default();
    }

    /// Upload batch `batch_index` into the ring buffers and bind them.
    pub fn update_buffers(&mut self, batch_index: u32, backend: &dyn RenderBackend2D) -> BackendResult<BatchInfo> {
        profile_function!();
        let pos = *self.batches.get(batch_index as usize).ok_or_else(|| {
            BackendError::InvalidHandle(format!("batch {} out of range ({} recorded)", batch_index, self.batches.len()))
        })?;

        let ring = match self.ring {
            Some(ring) => ring,
            None => {
                let ring = RingBuffers {
                    vertices: backend.create_buffer(
                        BufferKind::Vertex,
                        self.max_vertices as u64 * std::mem::size_of::<Vertex2D>() as u64,
                    )?,
                    indices: backend.create_buffer(
                        BufferKind::Index,
                        self.max_indices as u64 * std::mem::size_of::<Vertex2DIndex>() as u64,
                    )?,
                };
                tracing::debug!("Created batch ring buffers ({} vertices, {} indices)", self.max_vertices, self.max_indices);
                self.ring = Some(ring);
                ring
            }
        };

        // Cursors only advance once both writes have landed.
        let mut vertex_cursor = self.vertex_cursor;
        let mut index_cursor = self.index_cursor;
        let (base_vertex, vertex_mode) = vertex_cursor.reserve(pos.vertex_count, self.max_vertices, 1);
        let (start_index, index_mode) = index_cursor.reserve(pos.index_count, self.max_indices, INDEX_ALIGN);

        let vertices = &self.vertices[pos.vertex_start..pos.vertex_start + pos.vertex_count as usize];
        let indices = &self.indices[pos.index_start..pos.index_start + pos.index_count as usize];
        backend.write_buffer(
            ring.vertices,
            base_vertex as u64 * std::mem::size_of::<Vertex2D>() as u64,
            bytemuck::cast_slice(vertices),
            vertex_mode,
        )?;
        backend.write_buffer(
            ring.indices,
            start_index as u64 * std::mem::size_of::<Vertex2DIndex>() as u64,
            bytemuck::cast_slice(indices),
            index_mode,
        )?;
        self.vertex_cursor = vertex_cursor;
        self.index_cursor = index_cursor;
        backend.set_vertex_index_buffers(ring.vertices, ring.indices)?;

        Ok(BatchInfo {
            index_count: pos.index_count,
            start_index_location: start_index,
            base_vertex_location: base_vertex,
        })
    }
}

/// Extend `array` by `additional` default elements, doubling capacity when full.
fn grow<T: Default + Clone>(array: &mut Vec<T>, additional: usize) {
    let needed = array.len() + additional;
    if needed > array.capacity() {
        let target = (array.capacity().max(1) * 2).max(needed);
        array.reserve_exact(target - array.len());
    }
    array.resize(needed, T::default());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_batch(vertices: u32, indices: u32) -> Vertex2DBatch {
        let config = Renderer2DConfig::default()
            .with_batch_capacity(vertices, indices)
            .with_initial_array_sizes(4, 6);
        Vertex2DBatch::new(&config)
    }

    #[test]
    fn test_fresh_batch_is_empty() {
        let batch = small_batch(16, 24);
        assert_eq!(batch.num_batches(), 0);
        assert_eq!(batch.vertex_count(), 0);
    }

    #[test]
    fn test_index_offset_accumulates_within_batch() {
        let mut batch = small_batch(16, 24);
        let first = batch.request_buffer(4, 6).unwrap();
        assert_eq!(first.index_offset, 0);
        assert_eq!(first.vertices.len(), 4);
        assert_eq!(first.indices.len(), 6);
        let second = batch.request_buffer(4, 6).unwrap();
        assert_eq!(second.index_offset, 4);
        assert_eq!(second.batch_index, 0);
        assert_eq!(batch.num_batches(), 1);
    }

    #[test]
    fn test_rollover_on_vertex_capacity() {
        let mut batch = small_batch(8, 100);
        batch.request_buffer(4, 6).unwrap();
        batch.request_buffer(4, 6).unwrap();
        let third = batch.request_buffer(4, 6).unwrap();
        assert_eq!(third.batch_index, 1);
        assert_eq!(third.index_offset, 0);
        assert_eq!(batch.num_batches(), 2);
    }

    #[test]
    fn test_rollover_on_index_capacity() {
        let mut batch = small_batch(100, 12);
        batch.request_buffer(4, 6).unwrap();
        batch.request_buffer(4, 6).unwrap();
        let third = batch.request_buffer(3, 3).unwrap();
        assert_eq!(third.batch_index, 1);
    }

    #[test]
    fn test_oversized_request_is_dropped() {
        let mut batch = small_batch(8, 12);
        assert!(batch.request_buffer(9, 3).is_none());
        assert!(batch.request_buffer(3, 13).is_none());
        assert_eq!(batch.num_batches(), 0);
    }

    #[test]
    fn test_exact_capacity_fits() {
        let mut batch = small_batch(8, 12);
        let region = batch.request_buffer(8, 12).unwrap();
        assert_eq!(region.batch_index, 0);
    }

    #[test]
    fn test_reset_keeps_capacity() {
        let mut batch = small_batch(1024, 2048);
        for _ in 0..100 {
            batch.request_buffer(4, 6).unwrap();
        }
        let capacity = batch.vertices.capacity();
        batch.reset();
        assert_eq!(batch.num_batches(), 0);
        assert_eq!(batch.vertex_count(), 0);
        assert_eq!(batch.vertices.capacity(), capacity);
    }

    #[test]
    fn test_batch_contents_follow_requests() {
        let mut batch = small_batch(4, 6);
        {
            let region = batch.request_buffer(4, 6).unwrap();
            region.vertices[0].pos = [1.0, 2.0];
            region.indices.copy_from_slice(&[0, 1, 2, 2, 3, 0]);
        }
        {
            let region = batch.request_buffer(3, 3).unwrap();
            region.vertices[0].pos = [5.0, 6.0];
            region.indices.copy_from_slice(&[0, 1, 2]);
        }
        let (vertices, indices) = batch.batch_contents(1).unwrap();
        assert_eq!(vertices.len(), 3);
        assert_eq!(vertices[0].pos, [5.0, 6.0]);
        assert_eq!(indices, &[0, 1, 2]);
        assert!(batch.batch_contents(2).is_none());
    }

    #[test]
    fn test_ring_cursor_wraps_with_discard() {
        let mut cursor = RingCursor::default();
        assert_eq!(cursor.reserve(6, 10, 1), (0, WriteMode::NoOverwrite));
        assert_eq!(cursor.reserve(4, 10, 1), (6, WriteMode::NoOverwrite));
        assert_eq!(cursor.reserve(1, 10, 1), (0, WriteMode::Discard));
    }

    #[test]
    fn test_ring_cursor_alignment() {
        let mut cursor = RingCursor::default();
        assert_eq!(cursor.reserve(3, 12, 2), (0, WriteMode::NoOverwrite));
        assert_eq!(cursor.reserve(3, 12, 2), (4, WriteMode::NoOverwrite));
        assert_eq!(cursor.reserve(6, 12, 2), (0, WriteMode::Discard));
    }
}
