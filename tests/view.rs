#![cfg(feature = "view")]

use std::sync::Arc;

use egui::Color32;
use telemetry_plot::view::export_buttons;
use telemetry_plot::*;

struct NoExport;

impl ImageExporter for NoExport {
    fn export(&self, _: &ViewElement, _: &str, _: ExportFormat, _: Color32) -> PendingExport {
        PendingExport::ready(Err(PlotError::NothingToExport))
    }
}

fn controller() -> PlotController {
    let object = Arc::new(TelemetryObject::new("sat:temp", "Temperature"));
    let conductor = TimeConductor::new(TimeSystem::utc(), Bounds::new(0.0, 60.0)).unwrap();
    PlotController::new(
        ViewScope::new(object),
        conductor,
        ConfigStore::new(),
        Arc::new(NoExport),
    )
}

fn frame(ctx: &egui::Context, ctrl: &mut PlotController) {
    let _ = ctx.run(egui::RawInput::default(), |ctx| {
        egui::CentralPanel::default().show(ctx, |ui| {
            export_buttons(ui, ctrl);
            PlotView::new(ctrl).id_salt("under_test").show(ui);
        });
    });
}

#[test]
fn rendering_reports_element_size() {
    let ctx = egui::Context::default();
    let mut ctrl = controller();
    assert_eq!(ctrl.scope().element_width_px(), 0);
    frame(&ctx, &mut ctrl);
    assert!(ctrl.scope().element_width_px() > 0);
}

#[test]
fn synchronized_view_follows_new_conductor_range() {
    let ctx = egui::Context::default();
    let mut ctrl = controller();
    frame(&ctx, &mut ctrl);

    ctrl.config().lock().unwrap().x_axis.display_range = Some(Range::new(5.0, 6.0));
    ctrl.conductor().set_bounds(Bounds::new(100.0, 200.0)).unwrap();
    ctrl.poll();
    frame(&ctx, &mut ctrl);

    let cfg = ctrl.config();
    let cfg = cfg.lock().unwrap();
    assert_eq!(cfg.x_axis.display_range, Some(Range::new(100.0, 200.0)));
}
