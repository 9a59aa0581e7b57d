//! egui rendering of a [`PlotController`]'s configuration.
//!
//! The view is the rendering layer the controller talks to through its
//! scope: it reports the element size (the load size hint), writes the
//! display range when a user drag ends and raises the viewport-change-end
//! signal, and keeps the display range on the conductor range while the
//! controller is synchronized.

use std::sync::Arc;

use egui_plot::{Legend, Line, Plot};

use crate::controller::PlotController;
use crate::events::lock;
use crate::range::Range;
use crate::scope::ViewScope;

pub struct PlotView<'a> {
    controller: &'a mut PlotController,
    id_salt: &'a str,
    legend: bool,
}

impl<'a> PlotView<'a> {
    pub fn new(controller: &'a mut PlotController) -> Self {
        Self {
            controller,
            id_salt: "telemetry_plot",
            legend: true,
        }
    }

    pub fn id_salt(mut self, id_salt: &'a str) -> Self {
        self.id_salt = id_salt;
        self
    }

    pub fn legend(mut self, show: bool) -> Self {
        self.legend = show;
        self
    }

    pub fn show(self, ui: &mut egui::Ui) -> egui_plot::PlotResponse<()> {
        let config = self.controller.config();
        let follow_id = ui.id().with(self.id_salt).with("followed_range");
        let followed: Option<Range> = ui.data_mut(|d| d.get_temp(follow_id));
        let synchronized = self.controller.synchronized() != Some(false);

        let (display, lines) = {
            let mut cfg = lock(&config);
            // a new conductor range resets the view unless the user detached from it
            if synchronized && cfg.x_axis.range.is_some() && cfg.x_axis.range != followed {
                cfg.x_axis.display_range = cfg.x_axis.range;
                if let Some(range) = cfg.x_axis.range {
                    ui.data_mut(|d| d.insert_temp(follow_id, range));
                }
            }
            let lines: Vec<(String, Vec<[f64; 2]>)> = cfg
                .series()
                .iter()
                .map(|s| {
                    let s = lock(s);
                    (s.name().to_string(), s.records().iter().copied().collect())
                })
                .collect();
            (cfg.x_axis.display_range, lines)
        };

        let mut plot = Plot::new(self.id_salt)
            .allow_scroll(false)
            .allow_zoom(false)
            .allow_boxed_zoom(true);
        if self.legend {
            plot = plot.legend(Legend::default());
        }

        let response = plot.show(ui, |plot_ui| {
            let resp = plot_ui.response();
            let interacting = resp.dragged() || resp.drag_stopped();
            if !interacting {
                if let Some(d) = display {
                    plot_ui.set_plot_bounds_x(d.min..=d.max);
                }
            }
            for (name, points) in lines {
                plot_ui.line(Line::new(name, points));
            }
        });

        let rect = response.response.rect;
        self.controller
            .scope()
            .set_element_size(rect.width(), rect.height());

        if response.response.drag_stopped() {
            let rx = response.transform.bounds().range_x();
            let shown = Range::new(*rx.start(), *rx.end());
            lock(&config).x_axis.display_range = Some(shown);
            self.controller.scope().viewport_change_end();
        }
        response
    }
}

/// JPG/PNG buttons, hidden while an export is running.
pub fn export_buttons(ui: &mut egui::Ui, controller: &mut PlotController) {
    if controller.hide_export_buttons() {
        return;
    }
    ui.horizontal(|ui| {
        if ui.button("Export JPG").clicked() {
            controller.export_jpg();
        }
        if ui.button("Export PNG").clicked() {
            controller.export_png();
        }
    });
}

/// Ask the backend for a screenshot; it arrives as an input event next frame.
pub fn request_capture(ctx: &egui::Context) {
    ctx.send_viewport_cmd(egui::ViewportCommand::Screenshot(Default::default()));
}

/// Store the plot region of a received screenshot as the scope's capture.
/// Returns `false` when no screenshot arrived this frame.
pub fn store_capture(ctx: &egui::Context, scope: &ViewScope, plot_rect: egui::Rect) -> bool {
    let shot = ctx.input(|i| {
        i.events.iter().rev().find_map(|e| {
            if let egui::Event::Screenshot { image, .. } = e {
                Some(image.clone())
            } else {
                None
            }
        })
    });
    match shot {
        Some(image) => {
            let region = image.region(&plot_rect, Some(ctx.pixels_per_point()));
            scope.set_capture(Arc::new(region));
            true
        }
        None => false,
    }
}
