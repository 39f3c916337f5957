//! Grid spatial index.
//!
//! A map is a fixed grid of cells. Each cell keeps the objects standing on
//! it; an id registry resolves object ids to live objects so entities can
//! hold each other by id instead of by pointer.
//!
//! Cell locks are leaf locks. Scans copy a cell's occupants and release the
//! lock before visiting them, so visitors are free to lock entity state.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use log::trace;

use realm_shared::{ObjectId, ObjectType, Point};

use crate::entities::MapObject;

/// A single map cell
pub struct Cell {
    point: Point,
    walkable: bool,
    objects: Mutex<Vec<Arc<dyn MapObject>>>,
}

impl Cell {
    fn new(point: Point) -> Self {
        Self {
            point,
            walkable: true,
            objects: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<dyn MapObject>>> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn point(&self) -> Point {
        self.point
    }

    /// Whether objects may stand on this cell
    pub fn is_valid(&self) -> bool {
        self.walkable
    }

    /// Snapshot of the objects currently on this cell
    pub fn objects(&self) -> Vec<Arc<dyn MapObject>> {
        self.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Whether any occupant other than `except` blocks movement
    pub fn has_blocking(&self, except: Option<ObjectId>) -> bool {
        self.lock()
            .iter()
            .any(|o| Some(o.id()) != except && o.is_blocking())
    }

    fn add(&self, object: Arc<dyn MapObject>) {
        self.lock().push(object);
    }

    fn remove(&self, id: ObjectId) -> Option<Arc<dyn MapObject>> {
        let mut objects = self.lock();
        let index = objects.iter().position(|o| o.id() == id)?;
        Some(objects.swap_remove(index))
    }

    /// Add an item unless the cell already holds one
    fn try_add_item(&self, object: Arc<dyn MapObject>) -> bool {
        let mut objects = self.lock();
        if objects.iter().any(|o| o.race() == ObjectType::Item) {
            return false;
        }
        objects.push(object);
        true
    }
}

impl std::fmt::Debug for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cell")
            .field("point", &self.point)
            .field("walkable", &self.walkable)
            .field("objects", &self.lock().len())
            .finish()
    }
}

/// Cells whose visibility changed between two positions
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CellDiff {
    /// Cells in range of the new position only
    pub added: Vec<Point>,
    /// Cells in range of the old position only
    pub removed: Vec<Point>,
}

/// Largest width or height a map may have
pub const MAX_MAP_SIDE: i32 = 1 << 14;

/// Spatial index for one map
pub struct GridMap {
    width: i32,
    height: i32,
    cells: Vec<Cell>,
    registry: DashMap<ObjectId, Arc<dyn MapObject>>,
    next_object_id: AtomicU32,
}

impl GridMap {
    /// Create a fully walkable map. Each side is clamped to
    /// `1..=MAX_MAP_SIDE`.
    pub fn new(width: i32, height: i32) -> Self {
        let width = width.clamp(1, MAX_MAP_SIDE);
        let height = height.clamp(1, MAX_MAP_SIDE);
        let mut cells = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                cells.push(Cell::new(Point::new(x, y)));
            }
        }

        Self {
            width,
            height,
            cells,
            registry: DashMap::new(),
            next_object_id: AtomicU32::new(1),
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// Mark a cell as wall or floor. Only valid while building the map.
    pub fn set_walkable(&mut self, point: Point, walkable: bool) {
        if let Some(index) = self.index(point) {
            self.cells[index].walkable = walkable;
        }
    }

    /// Allocate a fresh object id
    pub fn new_object_id(&self) -> ObjectId {
        self.next_object_id.fetch_add(1, Ordering::Relaxed)
    }

    fn index(&self, point: Point) -> Option<usize> {
        if point.x < 0 || point.y < 0 || point.x >= self.width || point.y >= self.height {
            return None;
        }
        Some((point.y * self.width + point.x) as usize)
    }

    pub fn cell(&self, point: Point) -> Option<&Cell> {
        self.index(point).map(|i| &self.cells[i])
    }

    /// Whether `point` is a walkable cell on this map
    pub fn valid_point(&self, point: Point) -> bool {
        self.cell(point).is_some_and(Cell::is_valid)
    }

    /// Place an object on a walkable cell and register it
    pub fn add_object(&self, object: Arc<dyn MapObject>, point: Point) -> bool {
        let Some(cell) = self.cell(point).filter(|c| c.is_valid()) else {
            return false;
        };
        self.registry.insert(object.id(), object.clone());
        cell.add(object);
        true
    }

    /// Take an object off its cell and out of the registry
    pub fn remove_object(&self, id: ObjectId, point: Point) -> Option<Arc<dyn MapObject>> {
        if let Some(cell) = self.cell(point) {
            cell.remove(id);
        }
        self.registry.remove(&id).map(|(_, object)| object)
    }

    /// Move an object from `from` to `to` unless a blocking occupant other
    /// than itself is already there.
    ///
    /// Both cell locks are held across the check and the move, taken in
    /// index order, so two movers can never both enter the same free cell.
    pub fn try_move_object(&self, id: ObjectId, from: Point, to: Point) -> bool {
        let (Some(src), Some(dst)) = (self.index(from), self.index(to)) else {
            return false;
        };
        if src == dst || !self.cells[dst].is_valid() {
            return false;
        }

        let (mut source, mut dest) = if src < dst {
            let source = self.cells[src].lock();
            (source, self.cells[dst].lock())
        } else {
            let dest = self.cells[dst].lock();
            (self.cells[src].lock(), dest)
        };

        if dest.iter().any(|o| o.id() != id && o.is_blocking()) {
            return false;
        }
        let Some(index) = source.iter().position(|o| o.id() == id) else {
            return false;
        };
        dest.push(source.swap_remove(index));
        true
    }

    /// Place an item on `point` unless another item already lies there
    pub fn try_add_item(&self, object: Arc<dyn MapObject>, point: Point) -> bool {
        let Some(cell) = self.cell(point).filter(|c| c.is_valid()) else {
            return false;
        };
        let id = object.id();
        if !cell.try_add_item(object.clone()) {
            return false;
        }
        self.registry.insert(id, object);
        true
    }

    /// Resolve an object id to the live object
    pub fn object(&self, id: ObjectId) -> Option<Arc<dyn MapObject>> {
        self.registry.get(&id).map(|entry| entry.value().clone())
    }

    pub fn object_count(&self) -> usize {
        self.registry.len()
    }

    /// Visit the cells within `radius` of `center` in row-major order until
    /// the visitor returns false
    pub fn range_cells<F>(&self, center: Point, radius: i32, mut visitor: F)
    where
        F: FnMut(&Cell) -> bool,
    {
        let min_y = center.y.saturating_sub(radius).max(0);
        let max_y = center.y.saturating_add(radius).min(self.height - 1);
        let min_x = center.x.saturating_sub(radius).max(0);
        let max_x = center.x.saturating_add(radius).min(self.width - 1);

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let cell = &self.cells[(y * self.width + x) as usize];
                if !visitor(cell) {
                    return;
                }
            }
        }
    }

    /// Visit the objects within `radius` of `center` in row-major cell order
    /// until the visitor returns false
    pub fn range_objects<F>(&self, center: Point, radius: i32, mut visitor: F)
    where
        F: FnMut(&Arc<dyn MapObject>) -> bool,
    {
        self.range_cells(center, radius, |cell| {
            cell.objects().iter().all(|object| visitor(object))
        });
    }

    /// Cells that enter and leave a `radius` window when moving `from` -> `to`
    pub fn calc_diff(&self, from: Point, to: Point, radius: i32) -> CellDiff {
        let mut diff = CellDiff::default();
        if from == to {
            return diff;
        }

        self.range_cells(to, radius, |cell| {
            if !cell.point().in_range(from, radius) {
                diff.added.push(cell.point());
            }
            true
        });
        self.range_cells(from, radius, |cell| {
            if !cell.point().in_range(to, radius) {
                diff.removed.push(cell.point());
            }
            true
        });

        trace!("diff {} -> {}: +{} -{}", from, to, diff.added.len(), diff.removed.len());
        diff
    }

    /// Walkable cells around `center` ordered ring by ring out to `radius`
    pub fn drop_candidates(&self, center: Point, radius: i32) -> Vec<Point> {
        let mut points = Vec::new();
        for ring in 0..=radius.max(0) {
            self.range_cells(center, ring, |cell| {
                if cell.is_valid() && cell.point().distance(center) == ring {
                    points.push(cell.point());
                }
                true
            });
        }
        points
    }
}

impl std::fmt::Debug for GridMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridMap")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("objects", &self.registry.len())
            .finish()
    }
}
