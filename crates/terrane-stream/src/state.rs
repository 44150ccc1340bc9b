use std::fmt;
use std::time::{Duration, Instant};

use hashbrown::{HashMap, HashSet};
use terrane_chunk::{GenerationId, GenerationResult};
use terrane_world::ChunkCoord;

use crate::stats::StateCounts;

pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(5 * 60);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChunkState {
    Pending,
    Generating,
    Ready,
    Rendered,
    Removing,
}

impl ChunkState {
    const COUNT: usize = 5;

    #[inline]
    fn slot(self) -> usize {
        match self {
            ChunkState::Pending => 0,
            ChunkState::Generating => 1,
            ChunkState::Ready => 2,
            ChunkState::Rendered => 3,
            ChunkState::Removing => 4,
        }
    }
}

impl fmt::Display for ChunkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChunkState::Pending => "pending",
            ChunkState::Generating => "generating",
            ChunkState::Ready => "ready",
            ChunkState::Rendered => "rendered",
            ChunkState::Removing => "removing",
        };
        f.write_str(s)
    }
}

/// Requested state change. Payload-carrying states take their payload here.
#[derive(Debug)]
pub enum Transition {
    Pending,
    Generating { generation_id: GenerationId },
    Ready { result: GenerationResult },
    Rendered,
    Removing,
}

impl Transition {
    fn target(&self) -> ChunkState {
        match self {
            Transition::Pending => ChunkState::Pending,
            Transition::Generating { .. } => ChunkState::Generating,
            Transition::Ready { .. } => ChunkState::Ready,
            Transition::Rendered => ChunkState::Rendered,
            Transition::Removing => ChunkState::Removing,
        }
    }
}

fn is_legal(from: ChunkState, to: ChunkState) -> bool {
    use ChunkState::*;
    matches!(
        (from, to),
        (Pending, Generating)
            | (Generating, Ready)
            | (Generating, Pending)
            | (Generating, Removing)
            | (Ready, Rendered)
            | (Ready, Pending)
    )
}

#[derive(Debug)]
pub struct ChunkInfo {
    coord: ChunkCoord,
    state: ChunkState,
    priority: f32,
    generation_id: Option<GenerationId>,
    result: Option<GenerationResult>,
    last_accessed: Instant,
}

impl ChunkInfo {
    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }
    pub fn state(&self) -> ChunkState {
        self.state
    }
    pub fn priority(&self) -> f32 {
        self.priority
    }
    /// Set exactly while `Generating` (and on the way out through `Removing`).
    pub fn generation_id(&self) -> Option<GenerationId> {
        self.generation_id
    }
    pub fn result(&self) -> Option<&GenerationResult> {
        self.result.as_ref()
    }
    pub fn last_accessed(&self) -> Instant {
        self.last_accessed
    }
}

/// A chunk dropped from tracking, with what it was doing at the time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Eviction {
    pub coord: ChunkCoord,
    pub state: ChunkState,
    /// In-flight generation to cancel or ignore.
    pub generation_id: Option<GenerationId>,
}

#[inline]
fn priority_for(coord: ChunkCoord, center: ChunkCoord) -> f32 {
    1.0 / (1.0 + coord.distance(center))
}

/// Lifecycle of every tracked chunk. Single writer; each coordinate lives in
/// exactly one state index.
pub struct ChunkStateManager {
    chunks: HashMap<ChunkCoord, ChunkInfo>,
    by_state: [HashSet<ChunkCoord>; ChunkState::COUNT],
    center: ChunkCoord,
    render_radius: u32,
    stale_after: Duration,
}

impl ChunkStateManager {
    pub fn new(render_radius: u32) -> Self {
        Self {
            chunks: HashMap::new(),
            by_state: Default::default(),
            center: ChunkCoord::default(),
            render_radius,
            stale_after: DEFAULT_STALE_AFTER,
        }
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    #[inline]
    pub fn center(&self) -> ChunkCoord {
        self.center
    }

    #[inline]
    pub fn render_radius(&self) -> u32 {
        self.render_radius
    }

    /// Distance past which chunks are evicted.
    #[inline]
    pub fn eviction_distance(&self) -> f32 {
        self.render_radius as f32 + 1.0
    }

    /// Coordinates that should exist for the current center and radius.
    pub fn desired(&self) -> Vec<ChunkCoord> {
        self.center.within_radius(self.render_radius as i32)
    }

    pub fn add_chunk(&mut self, coord: ChunkCoord) -> bool {
        if self.chunks.contains_key(&coord) {
            return false;
        }
        self.chunks.insert(
            coord,
            ChunkInfo {
                coord,
                state: ChunkState::Pending,
                priority: priority_for(coord, self.center),
                generation_id: None,
                result: None,
                last_accessed: Instant::now(),
            },
        );
        self.by_state[ChunkState::Pending.slot()].insert(coord);
        true
    }

    pub fn set_chunk_state(&mut self, coord: ChunkCoord, transition: Transition) -> bool {
        let Some(info) = self.chunks.get_mut(&coord) else {
            log::debug!(target: "stream", "state change for untracked chunk {} ignored", coord);
            return false;
        };
        let from = info.state;
        let to = transition.target();
        if !is_legal(from, to) {
            log::warn!(target: "stream", "illegal transition {} -> {} for chunk {}", from, to, coord);
            return false;
        }
        match transition {
            Transition::Generating { generation_id } => {
                info.generation_id = Some(generation_id);
                info.result = None;
            }
            Transition::Ready { result } => {
                info.generation_id = None;
                info.result = Some(result);
            }
            Transition::Pending | Transition::Rendered => {
                info.generation_id = None;
                info.result = None;
            }
            // Keeps the id so the eviction can report it.
            Transition::Removing => info.result = None,
        }
        info.state = to;
        info.last_accessed = Instant::now();
        self.by_state[from.slot()].remove(&coord);
        self.by_state[to.slot()].insert(coord);
        true
    }

    /// Moves a ready chunk's payload out for mesh building. The chunk stays
    /// `Ready` until the caller moves it on.
    pub fn take_ready_result(&mut self, coord: ChunkCoord) -> Option<GenerationResult> {
        let info = self.chunks.get_mut(&coord)?;
        if info.state != ChunkState::Ready {
            return None;
        }
        info.result.take()
    }

    fn evict(&mut self, coord: ChunkCoord) -> Option<Eviction> {
        let state = self.chunks.get(&coord)?.state;
        if state == ChunkState::Generating {
            self.set_chunk_state(coord, Transition::Removing);
        }
        let info = self.chunks.remove(&coord)?;
        self.by_state[info.state.slot()].remove(&coord);
        Some(Eviction {
            coord,
            state,
            generation_id: info.generation_id,
        })
    }

    fn evict_far(&mut self) -> Vec<Eviction> {
        let limit = self.eviction_distance();
        let center = self.center;
        let mut far: Vec<ChunkCoord> = self
            .chunks
            .keys()
            .copied()
            .filter(|c| c.distance(center) > limit)
            .collect();
        far.sort();
        far.into_iter().filter_map(|c| self.evict(c)).collect()
    }

    /// Re-prioritizes around `coord` and evicts everything past the buffer ring.
    pub fn update_center(&mut self, coord: ChunkCoord) -> Vec<Eviction> {
        self.center = coord;
        for info in self.chunks.values_mut() {
            info.priority = priority_for(info.coord, coord);
        }
        let evicted = self.evict_far();
        if !evicted.is_empty() {
            log::debug!(target: "stream", "center {} evicted {} chunks", coord, evicted.len());
        }
        evicted
    }

    pub fn set_render_radius(&mut self, radius: u32) -> Vec<Eviction> {
        self.render_radius = radius;
        self.evict_far()
    }

    pub fn remove_chunk(&mut self, coord: ChunkCoord) -> Option<Eviction> {
        self.evict(coord)
    }

    pub fn clear(&mut self) -> Vec<Eviction> {
        let mut all: Vec<ChunkCoord> = self.chunks.keys().copied().collect();
        all.sort();
        all.into_iter().filter_map(|c| self.evict(c)).collect()
    }

    /// Evicts chunks that never reached `Rendered` and were not touched within
    /// the stale window.
    pub fn cleanup_stale(&mut self, now: Instant) -> Vec<Eviction> {
        let window = self.stale_after;
        let mut stale: Vec<ChunkCoord> = self
            .chunks
            .values()
            .filter(|i| {
                i.state != ChunkState::Rendered
                    && now.saturating_duration_since(i.last_accessed) > window
            })
            .map(|i| i.coord)
            .collect();
        stale.sort();
        let evicted: Vec<Eviction> = stale.into_iter().filter_map(|c| self.evict(c)).collect();
        if !evicted.is_empty() {
            log::info!(target: "stream", "stale cleanup evicted {} chunks", evicted.len());
        }
        evicted
    }

    fn sorted_by_priority(&self, state: ChunkState) -> Vec<ChunkCoord> {
        let mut out: Vec<(f32, ChunkCoord)> = self.by_state[state.slot()]
            .iter()
            .filter_map(|c| self.chunks.get(c).map(|i| (i.priority, *c)))
            .collect();
        out.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
        out.into_iter().map(|(_, c)| c).collect()
    }

    /// Highest priority first.
    pub fn pending(&self) -> Vec<ChunkCoord> {
        self.sorted_by_priority(ChunkState::Pending)
    }

    /// Highest priority first.
    pub fn ready(&self) -> Vec<ChunkCoord> {
        self.sorted_by_priority(ChunkState::Ready)
    }

    pub fn generating(&self) -> Vec<ChunkCoord> {
        self.by_state[ChunkState::Generating.slot()].iter().copied().collect()
    }

    pub fn rendered(&self) -> Vec<ChunkCoord> {
        self.by_state[ChunkState::Rendered.slot()].iter().copied().collect()
    }

    pub fn get(&self, coord: ChunkCoord) -> Option<&ChunkInfo> {
        self.chunks.get(&coord)
    }

    pub fn state_of(&self, coord: ChunkCoord) -> Option<ChunkState> {
        self.chunks.get(&coord).map(|i| i.state)
    }

    pub fn contains(&self, coord: ChunkCoord) -> bool {
        self.chunks.contains_key(&coord)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn counts(&self) -> StateCounts {
        let n = |s: ChunkState| self.by_state[s.slot()].len();
        StateCounts {
            total: self.chunks.len(),
            pending: n(ChunkState::Pending),
            generating: n(ChunkState::Generating),
            ready: n(ChunkState::Ready),
            rendered: n(ChunkState::Rendered),
            removing: n(ChunkState::Removing),
        }
    }
}
