use eframe::egui::{self, Color32, Pos2, Rect, RichText, Sense, Stroke, Ui, Vec2};
use egui_plot::{Bar, BarChart, HLine, Legend, LineStyle, Plot, PlotPoint, Points, Text};

use crate::color::{ColorMap, DivergingScale};
use crate::data::aggregate::{GroupMean, ScatterSeries, TreemapNode};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Chart section (Data tab, below the table)
// ---------------------------------------------------------------------------

/// Render the six emission charts. All of them derive from the unfiltered
/// consolidated view; only the table reacts to filters.
pub fn charts_section(ui: &mut Ui, state: &mut AppState) {
    let Some(data) = &state.data else {
        return;
    };
    let charts = &data.charts;

    mean_bar_chart(
        ui,
        "mean_by_make",
        "Mean CO₂ emissions by make (g/km)",
        &charts.by_make,
        &charts.co2_scale,
        charts.co2_mean,
    );
    mean_bar_chart(
        ui,
        "mean_by_class",
        "Mean CO₂ emissions by vehicle class (g/km)",
        &charts.by_class,
        &charts.co2_scale,
        charts.co2_mean,
    );
    mean_bar_chart(
        ui,
        "mean_by_year",
        "Mean CO₂ emissions by model year (g/km)",
        &charts.by_year,
        &charts.co2_scale,
        charts.co2_mean,
    );
    scatter_chart(
        ui,
        "scatter_fuel",
        "CO₂ emissions x combined consumption — fuel type",
        &charts.scatter_fuel,
        &charts.fuel_colors,
    );
    scatter_chart(
        ui,
        "scatter_class",
        "CO₂ emissions x combined consumption — vehicle class",
        &charts.scatter_class,
        &charts.class_colors,
    );

    ui.add_space(8.0);
    ui.strong("CO₂ emissions treemap (g/km)");
    let scale = charts.co2_scale;
    let tree = charts.tree.clone();
    treemap_chart(ui, &tree, scale, &mut state.treemap_path);
}

// ---------------------------------------------------------------------------
// Mean bars with global-mean reference line
// ---------------------------------------------------------------------------

fn mean_bar_chart(
    ui: &mut Ui,
    id: &str,
    title: &str,
    groups: &[GroupMean],
    scale: &DivergingScale,
    global_mean: f64,
) {
    ui.add_space(8.0);
    ui.strong(title);

    let bars: Vec<Bar> = groups
        .iter()
        .enumerate()
        .map(|(i, g)| {
            Bar::new(i as f64, g.mean)
                .name(g.key.to_string())
                .width(0.8)
                .fill(scale.color_for(g.mean))
        })
        .collect();

    let labels: Vec<String> = groups.iter().map(|g| g.key.to_string()).collect();
    let n = labels.len() as f64;

    Plot::new(id)
        .height(260.0)
        .y_axis_label("co2_emissions_g_km")
        .x_axis_formatter(move |mark, _range| {
            let i = mark.value.round();
            if (mark.value - i).abs() < 0.25 && i >= 0.0 && (i as usize) < labels.len() {
                labels[i as usize].clone()
            } else {
                String::new()
            }
        })
        .allow_drag(false)
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            plot_ui.bar_chart(BarChart::new(bars));
            plot_ui.hline(
                HLine::new(global_mean)
                    .color(Color32::from_rgb(128, 0, 128))
                    .style(LineStyle::dashed_loose()),
            );
            plot_ui.text(
                Text::new(
                    PlotPoint::new(n * 0.95, global_mean),
                    RichText::new(format!("Mean: {global_mean:.2} (g/km)")).size(12.0),
                )
                .anchor(egui::Align2::RIGHT_BOTTOM),
            );
        });
}

// ---------------------------------------------------------------------------
// Scatter, one point series per category
// ---------------------------------------------------------------------------

fn scatter_chart(
    ui: &mut Ui,
    id: &str,
    title: &str,
    series: &[ScatterSeries],
    colors: &ColorMap,
) {
    ui.add_space(8.0);
    ui.strong(title);

    Plot::new(id)
        .height(280.0)
        .x_axis_label("combined_l_100_km")
        .y_axis_label("co2_emissions_g_km")
        .legend(Legend::default())
        .show(ui, |plot_ui| {
            for s in series {
                let color = colors.color_for(&crate::data::model::CellValue::Str(s.label.clone()));
                plot_ui.points(
                    Points::new(s.points.clone())
                        .name(&s.label)
                        .color(color)
                        .radius(2.0),
                );
            }
        });
}

// ---------------------------------------------------------------------------
// Treemap
// ---------------------------------------------------------------------------

/// Render the drillable treemap. Clicking a tile descends one path level;
/// the breadcrumb row climbs back up.
fn treemap_chart(ui: &mut Ui, root: &TreemapNode, scale: DivergingScale, path: &mut Vec<String>) {
    // Breadcrumbs.
    ui.horizontal(|ui: &mut Ui| {
        if ui.selectable_label(false, &root.label).clicked() {
            path.clear();
        }
        let mut truncate_to: Option<usize> = None;
        for (depth, label) in path.iter().enumerate() {
            ui.label("›");
            if ui.selectable_label(false, label).clicked() {
                truncate_to = Some(depth + 1);
            }
        }
        if let Some(len) = truncate_to {
            path.truncate(len);
        }
    });

    // Resolve the node the user drilled into; reset on stale paths.
    let mut node = root;
    for label in path.iter() {
        match node.children.iter().find(|c| c.label == *label) {
            Some(child) => node = child,
            None => {
                node = root;
                break;
            }
        }
    }

    let (response, painter) =
        ui.allocate_painter(Vec2::new(ui.available_width(), 360.0), Sense::click());
    let rect = response.rect;

    if node.children.is_empty() {
        painter.rect_filled(rect, 2.0, scale.color_for(node.mean).gamma_multiply(0.8));
        painter.text(
            rect.center(),
            egui::Align2::CENTER_CENTER,
            format!("{}  {:.2}", node.label, node.mean),
            egui::FontId::proportional(14.0),
            Color32::BLACK,
        );
        return;
    }

    // Largest tiles first, as the layout expects.
    let mut order: Vec<usize> = (0..node.children.len()).collect();
    order.sort_by(|&a, &b| node.children[b].total.total_cmp(&node.children[a].total));
    let areas: Vec<f64> = order.iter().map(|&i| node.children[i].total).collect();
    let tiles = squarified_layout(&areas, rect);

    let clicked = response.clicked();
    let hover_pos = response.hover_pos();
    let mut descend: Option<String> = None;
    let mut hover_text: Option<String> = None;

    for (&child_idx, tile) in order.iter().zip(tiles.iter()) {
        let child = &node.children[child_idx];
        let tile = tile.shrink(1.0);
        if tile.width() <= 0.0 || tile.height() <= 0.0 {
            continue;
        }
        painter.rect_filled(tile, 2.0, scale.color_for(child.mean).gamma_multiply(0.8));
        painter.rect_stroke(
            tile,
            2.0,
            Stroke::new(1.0, Color32::from_gray(40)),
            egui::StrokeKind::Inside,
        );

        if tile.width() > 60.0 && tile.height() > 18.0 {
            painter.text(
                tile.left_top() + Vec2::new(4.0, 2.0),
                egui::Align2::LEFT_TOP,
                &child.label,
                egui::FontId::proportional(12.0),
                Color32::BLACK,
            );
        }

        if let Some(pos) = hover_pos {
            if tile.contains(pos) {
                hover_text = Some(format!(
                    "{}\nmean: {:.2} g/km\nvehicles: {}",
                    child.label, child.mean, child.count
                ));
                if clicked && !child.children.is_empty() {
                    descend = Some(child.label.clone());
                }
            }
        }
    }

    if let Some(text) = hover_text {
        response.on_hover_text(text);
    }
    if let Some(label) = descend {
        path.push(label);
    }
}

/// Squarified treemap layout: partition `rect` into one tile per area,
/// keeping aspect ratios close to 1. `areas` should be sorted descending.
pub fn squarified_layout(areas: &[f64], rect: Rect) -> Vec<Rect> {
    let total: f64 = areas.iter().sum();
    if areas.is_empty() || total <= 0.0 || rect.width() <= 0.0 || rect.height() <= 0.0 {
        return vec![Rect::from_min_size(rect.min, Vec2::ZERO); areas.len()];
    }

    // Normalize so areas sum to the pixel area of the rect.
    let pixel_area = (rect.width() * rect.height()) as f64;
    let scaled: Vec<f64> = areas.iter().map(|a| a / total * pixel_area).collect();

    let mut tiles = Vec::with_capacity(scaled.len());
    let mut remaining = rect;
    let mut i = 0;

    while i < scaled.len() {
        let side = remaining.width().min(remaining.height()) as f64;
        if side <= 0.0 {
            for _ in i..scaled.len() {
                tiles.push(Rect::from_min_size(remaining.min, Vec2::ZERO));
            }
            break;
        }

        // Grow the row while it improves the worst aspect ratio.
        let mut end = i + 1;
        while end < scaled.len()
            && worst_ratio(&scaled[i..end + 1], side) <= worst_ratio(&scaled[i..end], side)
        {
            end += 1;
        }

        let row_sum: f64 = scaled[i..end].iter().sum();
        if row_sum <= 0.0 {
            for _ in i..end {
                tiles.push(Rect::from_min_size(remaining.min, Vec2::ZERO));
            }
            i = end;
            continue;
        }
        let thickness = (row_sum / side) as f32;

        if remaining.width() >= remaining.height() {
            // Vertical strip on the left edge.
            let mut y = remaining.top();
            for a in &scaled[i..end] {
                let h = (a / row_sum) as f32 * remaining.height();
                tiles.push(Rect::from_min_size(
                    Pos2::new(remaining.left(), y),
                    Vec2::new(thickness, h),
                ));
                y += h;
            }
            remaining.min.x += thickness;
        } else {
            // Horizontal strip along the top edge.
            let mut x = remaining.left();
            for a in &scaled[i..end] {
                let w = (a / row_sum) as f32 * remaining.width();
                tiles.push(Rect::from_min_size(
                    Pos2::new(x, remaining.top()),
                    Vec2::new(w, thickness),
                ));
                x += w;
            }
            remaining.min.y += thickness;
        }

        i = end;
    }

    tiles
}

fn worst_ratio(row: &[f64], side: f64) -> f64 {
    let sum: f64 = row.iter().sum();
    if sum <= 0.0 || side <= 0.0 {
        return f64::INFINITY;
    }
    let max = row.iter().cloned().fold(f64::MIN, f64::max);
    let min = row.iter().cloned().fold(f64::MAX, f64::min);
    let s2 = sum * sum;
    let side2 = side * side;
    (side2 * max / s2).max(s2 / (side2 * min))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_partitions_the_rect() {
        let rect = Rect::from_min_size(Pos2::new(10.0, 20.0), Vec2::new(400.0, 300.0));
        let areas = [6.0, 6.0, 4.0, 3.0, 2.0, 2.0, 1.0];
        let tiles = squarified_layout(&areas, rect);
        assert_eq!(tiles.len(), areas.len());

        let total_px: f32 = tiles.iter().map(|t| t.width() * t.height()).sum();
        assert!((total_px - rect.width() * rect.height()).abs() < 5.0);

        for tile in &tiles {
            assert!(tile.min.x >= rect.min.x - 0.01 && tile.max.x <= rect.max.x + 0.01);
            assert!(tile.min.y >= rect.min.y - 0.01 && tile.max.y <= rect.max.y + 0.01);
        }

        // Tile areas are proportional to the inputs.
        let unit = (tiles[0].width() * tiles[0].height()) / areas[0] as f32;
        for (tile, area) in tiles.iter().zip(areas) {
            let got = tile.width() * tile.height();
            assert!((got - unit * area as f32).abs() < 5.0);
        }
    }

    #[test]
    fn degenerate_inputs_do_not_panic() {
        let rect = Rect::from_min_size(Pos2::ZERO, Vec2::new(100.0, 100.0));
        assert!(squarified_layout(&[], rect).is_empty());
        let tiles = squarified_layout(&[0.0, 0.0], rect);
        assert_eq!(tiles.len(), 2);
        let tiles = squarified_layout(&[5.0], Rect::from_min_size(Pos2::ZERO, Vec2::ZERO));
        assert_eq!(tiles.len(), 1);
    }
}
