use eframe::egui::{Color32, Painter, Pos2, Rect, Shape, Stroke, Vec2};

use super::render::{Outline, Shadow, Surface, rotated_corners};

/// Paints clock-local coordinates into an egui painter, scaled so that the
/// clock's `size` maps onto `target`.
pub struct PainterSurface<'a> {
    painter: &'a Painter,
    target: Rect,
    scale: f32,
    background: Color32,
}

impl<'a> PainterSurface<'a> {
    pub fn new(painter: &'a Painter, target: Rect, clock_size: f32, background: Color32) -> Self {
        let scale = target.width().min(target.height()) / clock_size.max(1.0);
        Self {
            painter,
            target,
            scale,
            background,
        }
    }

    fn map(&self, point: Pos2) -> Pos2 {
        self.target.min + point.to_vec2() * self.scale
    }

    fn shadow_offset(&self, shadow: &Shadow) -> Vec2 {
        shadow.offset * self.scale
    }
}

impl Surface for PainterSurface<'_> {
    fn clear(&mut self, _size: f32) {
        self.painter.rect_filled(self.target, 0.0, self.background);
    }

    fn fill_circle(
        &mut self,
        center: Pos2,
        radius: f32,
        fill: Color32,
        outline: Option<Outline>,
        shadow: Option<Shadow>,
    ) {
        let center = self.map(center);
        let radius = radius * self.scale;
        if let Some(shadow) = shadow {
            // egui has no blur; a slightly larger translucent disc stands in
            self.painter.circle_filled(
                center + self.shadow_offset(&shadow),
                radius + shadow.blur * self.scale / 2.0,
                shadow.color,
            );
        }
        let stroke = match outline {
            Some(outline) => Stroke::new(outline.width * self.scale, outline.color),
            None => Stroke::NONE,
        };
        self.painter.circle(center, radius, fill, stroke);
    }

    fn fill_rotated_rect(
        &mut self,
        pivot: Pos2,
        angle: f32,
        rect: Rect,
        fill: Color32,
        shadow: Option<Shadow>,
    ) {
        let corners = rotated_corners(pivot, angle, rect).map(|corner| self.map(corner));
        if let Some(shadow) = shadow {
            let offset = self.shadow_offset(&shadow);
            let shifted = corners.iter().map(|corner| *corner + offset).collect();
            self.painter
                .add(Shape::convex_polygon(shifted, shadow.color, Stroke::NONE));
        }
        self.painter
            .add(Shape::convex_polygon(corners.to_vec(), fill, Stroke::NONE));
    }
}
