use std::time::Instant;

use eframe::egui;
use glam::{Affine2, Vec2, vec2};
use rand::rngs::ThreadRng;
use snowfield::{Bounds, ParticleField, Style, Surface, Tunables};

const FLAKE_COUNT: usize = 300;
const NIGHT_SKY: egui::Color32 = egui::Color32::from_rgb(8, 12, 24);

/// [`Surface`] over an egui painter. Keeps a 2D affine transform stack and
/// projects path points through the transform current when they are added, so
/// per-branch rotations inside one path come out right.
struct PainterSurface<'a> {
    painter: &'a egui::Painter,
    rect: egui::Rect,
    transform: Affine2,
    stack: Vec<Affine2>,
    segments: Vec<[egui::Pos2; 2]>,
    cursor: egui::Pos2,
}

impl<'a> PainterSurface<'a> {
    fn new(painter: &'a egui::Painter, rect: egui::Rect) -> Self {
        Self {
            painter,
            rect,
            transform: Affine2::from_translation(vec2(rect.min.x, rect.min.y)),
            stack: Vec::new(),
            segments: Vec::new(),
            cursor: rect.min,
        }
    }

    fn project(&self, x: f32, y: f32) -> egui::Pos2 {
        let p = self.transform.transform_point2(Vec2::new(x, y));
        egui::pos2(p.x, p.y)
    }
}

impl Surface for PainterSurface<'_> {
    fn clear(&mut self) {
        self.painter.rect_filled(self.rect, 0.0, NIGHT_SKY);
    }

    fn save(&mut self) {
        self.stack.push(self.transform);
    }

    fn restore(&mut self) {
        if let Some(transform) = self.stack.pop() {
            self.transform = transform;
        }
    }

    fn translate(&mut self, dx: f32, dy: f32) {
        self.transform = self.transform * Affine2::from_translation(vec2(dx, dy));
    }

    fn rotate(&mut self, radians: f32) {
        self.transform = self.transform * Affine2::from_angle(radians);
    }

    fn begin_path(&mut self) {
        self.segments.clear();
    }

    fn move_to(&mut self, x: f32, y: f32) {
        self.cursor = self.project(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let p = self.project(x, y);
        self.segments.push([self.cursor, p]);
        self.cursor = p;
    }

    fn stroke(&mut self, style: Style) {
        let [r, g, b, a] = style.color;
        let stroke = egui::Stroke::new(
            style.line_width,
            egui::Color32::from_rgba_unmultiplied(r, g, b, a),
        );
        for segment in &self.segments {
            self.painter.line_segment(*segment, stroke);
        }
    }
}

struct SnowfieldApp {
    field: ParticleField,
    tunables: Tunables,
    rng: ThreadRng,
    started: Instant,
    last_frame_time: Instant,
    bounds: Bounds,
}

impl SnowfieldApp {
    fn new(_cc: &eframe::CreationContext) -> Self {
        let bounds = Bounds::new(1280.0, 720.0);
        log::info!("spawning {FLAKE_COUNT} flakes");
        Self {
            field: ParticleField::new(FLAKE_COUNT, bounds),
            tunables: Tunables::default(),
            rng: rand::thread_rng(),
            started: Instant::now(),
            last_frame_time: Instant::now(),
            bounds,
        }
    }

    fn controls_panel(&mut self, ui: &mut egui::Ui, frame_time: f32) {
        ui.label(format!("FPS: {:.1}", 1.0 / frame_time.max(1e-6)));
        ui.label(format!("Frame Time: {:.3}ms", frame_time * 1000.0));
        ui.label(format!("Flakes: {}", self.field.flakes.len()));
        ui.separator();

        ui.horizontal(|ui| {
            ui.label("Gravity: ");
            ui.add(egui::Slider::new(&mut self.tunables.gravity, 10.0..=100.0));
        });

        ui.horizontal(|ui| {
            ui.label("Wind: ");
            ui.add(egui::Slider::new(
                &mut self.tunables.wind_strength,
                0.0..=20.0,
            ));
        });

        ui.checkbox(&mut self.tunables.quantum_enabled, "Quantum uncertainty");
        ui.horizontal(|ui| {
            ui.label("Quantum: ");
            ui.add_enabled(
                self.tunables.quantum_enabled,
                egui::Slider::new(&mut self.tunables.quantum_factor, 0.0..=1.0).step_by(0.1),
            );
        });

        if ui.button("Reshake").clicked() {
            self.field = ParticleField::new(FLAKE_COUNT, self.bounds);
        }
    }
}

impl eframe::App for SnowfieldApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame_time).as_secs_f32();
        self.last_frame_time = now;
        let clock_ms = self.started.elapsed().as_secs_f64() * 1000.0;

        egui::SidePanel::left("Controls").show(ctx, |ui| {
            self.controls_panel(ui, dt);
        });

        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(NIGHT_SKY))
            .show(ctx, |ui| {
                let (rect, _response) =
                    ui.allocate_exact_size(ui.available_size(), egui::Sense::hover());
                self.bounds = Bounds::new(rect.width(), rect.height());

                self.field
                    .update(dt, clock_ms, self.bounds, &self.tunables, &mut self.rng);

                let painter = ui.painter_at(rect);
                let mut surface = PainterSurface::new(&painter, rect);
                self.field.render(&mut surface);
            });

        ctx.request_repaint();
    }
}

fn main() -> Result<(), eframe::Error> {
    env_logger::init();
    eframe::run_native(
        "Snowfield",
        eframe::NativeOptions {
            initial_window_size: Some(egui::vec2(1280.0, 720.0)),
            ..Default::default()
        },
        Box::new(|cc| Box::new(SnowfieldApp::new(cc))),
    )
}
