use tracing::debug;

use crate::AttachmentSet;
use crate::SlotKey;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// On-screen bounds of one rendered attachment slot.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SlotRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl SlotRect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    fn distance_sq(&self, point: Point) -> f32 {
        let c = self.center();
        let dx = c.x - point.x;
        let dy = c.y - point.y;
        dx * dx + dy * dy
    }
}

/// Pointer-drag reordering over rendered slots. Reorders are applied to the
/// set as the pointer moves; release has no further effect.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DragReorderController {
    dragging: Option<SlotKey>,
}

impl DragReorderController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grab(&mut self, key: SlotKey) {
        debug!("attachments.reorder.grab key={key}");
        self.dragging = Some(key);
    }

    pub fn dragging(&self) -> Option<&SlotKey> {
        self.dragging.as_ref()
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging.is_some()
    }

    /// Move the dragged slot to the index of the slot whose center is nearest
    /// to `point`. `layout[i]` is the rectangle of the slot currently at index
    /// `i`. Returns true when the set changed.
    pub fn hover(&self, point: Point, layout: &[SlotRect], set: &mut AttachmentSet) -> bool {
        let Some(key) = &self.dragging else {
            return false;
        };
        let Some(current) = set.position(key) else {
            return false;
        };
        let Some(target) = nearest_center(point, layout) else {
            return false;
        };
        if target == current {
            return false;
        }
        let moved = set.reorder(key, target);
        if moved {
            debug!("attachments.reorder.applied key={key} from={current} to={target}");
        }
        moved
    }

    pub fn release(&mut self) {
        if let Some(key) = self.dragging.take() {
            debug!("attachments.reorder.release key={key}");
        }
    }

    /// Same as release: reorders applied during the drag stay applied.
    pub fn cancel(&mut self) {
        self.release();
    }
}

/// Index of the rect whose center is closest to `point`; ties keep the lower index.
fn nearest_center(point: Point, layout: &[SlotRect]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (idx, rect) in layout.iter().enumerate() {
        let d = rect.distance_sq(point);
        match best {
            Some((_, best_d)) if d >= best_d => {}
            _ => best = Some((idx, d)),
        }
    }
    best.map(|(idx, _)| idx)
}
