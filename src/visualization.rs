//! Visualization utilities for PDPTW solutions and ALNS runs.
//!
//! Generates SVG route maps, distance history and operator weight charts, and
//! exports the iteration log as CSV for external plotting.

use crate::heuristics::alns::IterationRecord;
use crate::heuristics::destroy::DestroyOperator;
use crate::heuristics::repair::RepairOperator;
use crate::instance::{NodeRole, PDPTWInstance};
use crate::solution::Solution;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::process::Command;

const ROUTE_COLORS: [&str; 10] = [
    "#3498db", "#e74c3c", "#2ecc71", "#9b59b6", "#f39c12", "#1abc9c", "#d35400", "#34495e", "#c0392b", "#16a085",
];

/// Which weight vector of the log to plot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightFamily {
    Destroy,
    Repair,
}

/// SVG visualization generator
pub struct Visualizer {
    /// Canvas width
    pub width: f64,
    /// Canvas height
    pub height: f64,
    /// Margin
    pub margin: f64,
    /// Node radius
    pub node_radius: f64,
}

impl Default for Visualizer {
    fn default() -> Self {
        Visualizer {
            width: 800.0,
            height: 800.0,
            margin: 50.0,
            node_radius: 6.0,
        }
    }
}

impl Visualizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route map: one colour per route, depot as a square, pickups as circles,
    /// deliveries as diamonds. Unserved requests are drawn hollow.
    pub fn generate_route_svg(&self, instance: &PDPTWInstance, solution: &Solution) -> String {
        let mut svg = String::new();

        let (min_x, max_x, min_y, max_y) = self.get_bounds(instance);
        let scale_x = (self.width - 2.0 * self.margin) / (max_x - min_x).max(1.0);
        let scale_y = (self.height - 2.0 * self.margin) / (max_y - min_y).max(1.0);
        let scale = scale_x.min(scale_y);

        svg.push_str(&format!(
            r##"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" viewBox="0 0 {} {}">
<style>
    .depot {{ fill: #2c3e50; stroke: #2c3e50; stroke-width: 2; }}
    .unserved {{ fill: none; stroke: #7f8c8d; stroke-width: 1.5; stroke-dasharray: 3,2; }}
    .edge {{ stroke-width: 2; fill: none; }}
    .label {{ font-family: Arial; font-size: 10px; fill: #2c3e50; }}
    .title {{ font-family: Arial; font-size: 14px; fill: #2c3e50; font-weight: bold; }}
</style>
<rect width="100%" height="100%" fill="#ecf0f1"/>
"##,
            self.width, self.height, self.width, self.height
        ));

        svg.push_str(&format!(
            r##"<text x="{}" y="25" class="title">Instance: {} | Distance: {:.2} | Vehicles: {} | Unserved: {}</text>
"##,
            self.margin,
            instance.name,
            solution.distance(),
            solution.num_vehicles(),
            solution.unserved.len()
        ));

        let transform = |x: f64, y: f64| -> (f64, f64) {
            let tx = self.margin + (x - min_x) * scale;
            let ty = self.height - self.margin - (y - min_y) * scale;
            (tx, ty)
        };

        let mut color_of = vec![None; instance.nodes.len()];
        for (r, route) in solution.routes.iter().enumerate() {
            let color = ROUTE_COLORS[r % ROUTE_COLORS.len()];
            let points: Vec<String> = route
                .nodes
                .iter()
                .map(|&id| {
                    let (x, y) = transform(instance.node(id).x, instance.node(id).y);
                    format!("{:.2},{:.2}", x, y)
                })
                .collect();
            svg.push_str(&format!(
                r##"<polyline points="{}" class="edge" stroke="{}"/>
"##,
                points.join(" "),
                color
            ));
            for &id in &route.nodes {
                color_of[id] = Some(color);
            }
        }

        for node in &instance.nodes {
            let (x, y) = transform(node.x, node.y);
            let r = self.node_radius;
            let style = match color_of[node.id] {
                Some(color) => format!(r#"fill="{}" stroke="{}""#, color, color),
                None => r#"class="unserved""#.to_string(),
            };

            match node.role {
                NodeRole::Depot => svg.push_str(&format!(
                    r##"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" class="depot"/>
"##,
                    x - r * 1.5,
                    y - r * 1.5,
                    r * 3.0,
                    r * 3.0
                )),
                NodeRole::Pickup => svg.push_str(&format!(
                    r##"<circle cx="{:.2}" cy="{:.2}" r="{}" {}/>
"##,
                    x, y, r, style
                )),
                NodeRole::Delivery => svg.push_str(&format!(
                    r##"<polygon points="{:.2},{:.2} {:.2},{:.2} {:.2},{:.2} {:.2},{:.2}" {}/>
"##,
                    x,
                    y - r,
                    x + r,
                    y,
                    x,
                    y + r,
                    x - r,
                    y,
                    style
                )),
            }

            svg.push_str(&format!(
                r##"<text x="{:.2}" y="{:.2}" class="label" text-anchor="middle">{}</text>
"##,
                x,
                y - r - 3.0,
                node.label
            ));
        }

        let legend_y = self.height - 25.0;
        svg.push_str(&format!(
            r##"<rect x="{}" y="{}" width="12" height="12" class="depot"/>
<text x="{}" y="{}" class="label">Depot</text>
<circle cx="{}" cy="{}" r="6" fill="#7f8c8d"/>
<text x="{}" y="{}" class="label">Pickup</text>
<polygon points="{},{} {},{} {},{} {},{}" fill="#7f8c8d"/>
<text x="{}" y="{}" class="label">Delivery</text>
"##,
            self.margin,
            legend_y,
            self.margin + 18.0,
            legend_y + 10.0,
            self.margin + 86.0,
            legend_y + 6.0,
            self.margin + 98.0,
            legend_y + 10.0,
            self.margin + 166.0,
            legend_y,
            self.margin + 172.0,
            legend_y + 6.0,
            self.margin + 166.0,
            legend_y + 12.0,
            self.margin + 160.0,
            legend_y + 6.0,
            self.margin + 180.0,
            legend_y + 10.0
        ));

        svg.push_str("</svg>");
        svg
    }

    /// Current and best distance per iteration
    pub fn generate_history_svg(&self, log: &[IterationRecord]) -> String {
        let current: Vec<f64> = log.iter().map(|r| r.current_distance).collect();
        let best: Vec<f64> = log.iter().map(|r| r.best_distance).collect();
        self.line_chart(
            "Distance history",
            "distance",
            &[("current", "#3498db", current), ("best", "#e74c3c", best)],
        )
    }

    /// One line per operator of the chosen family
    pub fn generate_weights_svg(&self, log: &[IterationRecord], family: WeightFamily) -> String {
        let (title, names): (&str, Vec<&str>) = match family {
            WeightFamily::Destroy => (
                "Destroy operator weights",
                DestroyOperator::ALL.iter().map(|op| op.name()).collect(),
            ),
            WeightFamily::Repair => (
                "Repair operator weights",
                RepairOperator::ALL.iter().map(|op| op.name()).collect(),
            ),
        };

        let series: Vec<(&str, &str, Vec<f64>)> = names
            .iter()
            .enumerate()
            .map(|(i, &name)| {
                let values = log
                    .iter()
                    .map(|r| {
                        let weights = match family {
                            WeightFamily::Destroy => &r.destroy_weights,
                            WeightFamily::Repair => &r.repair_weights,
                        };
                        weights.get(i).copied().unwrap_or(0.0)
                    })
                    .collect();
                (name, ROUTE_COLORS[i % ROUTE_COLORS.len()], values)
            })
            .collect();

        self.line_chart(title, "weight", &series)
    }

    fn line_chart(&self, title: &str, y_label: &str, series: &[(&str, &str, Vec<f64>)]) -> String {
        let width = self.width;
        let height = 400.0;
        let margin = 60.0;
        let plot_width = width - 2.0 * margin;
        let plot_height = height - 2.0 * margin;

        let n = series.iter().map(|(_, _, v)| v.len()).max().unwrap_or(0);
        let mut y_min = f64::INFINITY;
        let mut y_max = f64::NEG_INFINITY;
        for (_, _, values) in series {
            for &v in values {
                y_min = y_min.min(v);
                y_max = y_max.max(v);
            }
        }
        if !y_min.is_finite() || !y_max.is_finite() {
            y_min = 0.0;
            y_max = 1.0;
        }
        if (y_max - y_min).abs() < 1e-12 {
            y_max = y_min + 1.0;
        }

        let x_scale = plot_width / (n.max(2) - 1) as f64;
        let y_scale = plot_height / (y_max - y_min);

        let mut svg = String::new();
        svg.push_str(&format!(
            r##"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" viewBox="0 0 {} {}">
<style>
    .line {{ stroke-width: 2; fill: none; }}
    .axis {{ stroke: #2c3e50; stroke-width: 1; }}
    .label {{ font-family: Arial; font-size: 12px; fill: #2c3e50; }}
    .title {{ font-family: Arial; font-size: 14px; fill: #2c3e50; font-weight: bold; }}
</style>
<rect width="100%" height="100%" fill="#ecf0f1"/>
<text x="{}" y="25" class="title">{}</text>
<line x1="{}" y1="{}" x2="{}" y2="{}" class="axis"/>
<line x1="{}" y1="{}" x2="{}" y2="{}" class="axis"/>
<text x="{}" y="{}" class="label">{:.2}</text>
<text x="{}" y="{}" class="label">{:.2}</text>
<text x="{}" y="{}" class="label">{}</text>
<text x="{}" y="{}" class="label" text-anchor="end">iteration {}</text>
"##,
            width,
            height,
            width,
            height,
            margin,
            title,
            margin,
            height - margin,
            width - margin,
            height - margin,
            margin,
            margin,
            margin,
            height - margin,
            5.0,
            margin + 4.0,
            y_max,
            5.0,
            height - margin,
            y_min,
            5.0,
            margin - 15.0,
            y_label,
            width - margin,
            height - margin + 20.0,
            n
        ));

        for (idx, (name, color, values)) in series.iter().enumerate() {
            let mut path = String::new();
            for (i, &v) in values.iter().enumerate() {
                let x = margin + i as f64 * x_scale;
                let y = height - margin - (v - y_min) * y_scale;
                if i == 0 {
                    path.push_str(&format!("M {:.2} {:.2}", x, y));
                } else {
                    path.push_str(&format!(" L {:.2} {:.2}", x, y));
                }
            }
            if !path.is_empty() {
                svg.push_str(&format!(
                    r##"<path d="{}" class="line" stroke="{}"/>
"##,
                    path, color
                ));
            }

            let legend_x = margin + idx as f64 * 150.0;
            svg.push_str(&format!(
                r##"<rect x="{}" y="{}" width="12" height="12" fill="{}"/>
<text x="{}" y="{}" class="label">{}</text>
"##,
                legend_x,
                height - 25.0,
                color,
                legend_x + 16.0,
                height - 15.0,
                name
            ));
        }

        svg.push_str("</svg>");
        svg
    }

    /// Save SVG to file
    pub fn save_svg<P: AsRef<Path>>(&self, svg: &str, path: P) -> std::io::Result<()> {
        let mut file = File::create(path)?;
        file.write_all(svg.as_bytes())?;
        Ok(())
    }

    /// Save SVG as PNG using an external converter if available.
    /// Tries `rsvg-convert`, then `magick convert`, then `inkscape`.
    pub fn save_png<P: AsRef<Path>>(&self, svg: &str, path: P) -> std::io::Result<()> {
        svg_to_png_file(svg, path.as_ref())
    }

    /// Get coordinate bounds
    fn get_bounds(&self, instance: &PDPTWInstance) -> (f64, f64, f64, f64) {
        let mut min_x = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_y = f64::NEG_INFINITY;

        for node in &instance.nodes {
            min_x = min_x.min(node.x);
            max_x = max_x.max(node.x);
            min_y = min_y.min(node.y);
            max_y = max_y.max(node.y);
        }

        (min_x, max_x, min_y, max_y)
    }
}

/// Render an SVG string to a PNG file with the first external converter that works
pub fn svg_to_png_file(svg: &str, out: &Path) -> std::io::Result<()> {
    let tmp = out.with_extension("svg.tmp");
    std::fs::write(&tmp, svg)?;
    let tmp_str = tmp.to_string_lossy().to_string();
    let out_str = out.to_string_lossy().to_string();

    let converters: [(&str, Vec<&str>); 3] = [
        ("rsvg-convert", vec!["-o", out_str.as_str(), tmp_str.as_str()]),
        ("magick", vec!["convert", tmp_str.as_str(), out_str.as_str()]),
        ("inkscape", vec![tmp_str.as_str(), "--export-type=png", "--export-filename", out_str.as_str()]),
    ];

    for (program, args) in &converters {
        if let Ok(status) = Command::new(program).args(args).status() {
            if status.success() {
                let _ = std::fs::remove_file(&tmp);
                return Ok(());
            }
        }
        log::debug!("{} unavailable or failed", program);
    }

    let _ = std::fs::remove_file(&tmp);
    Err(std::io::Error::new(
        std::io::ErrorKind::Other,
        "No SVG->PNG converter succeeded (tried rsvg-convert, magick, inkscape)",
    ))
}

/// Write the iteration log as CSV, one weight per column
pub fn export_log_csv<P: AsRef<Path>>(log: &[IterationRecord], path: P) -> std::io::Result<()> {
    let file = File::create(path)?;
    let mut writer = csv::Writer::from_writer(file);

    let mut header: Vec<String> = [
        "iteration",
        "current_distance",
        "best_distance",
        "candidate_distance",
        "temperature",
        "destroy",
        "repair",
        "removal_size",
        "score",
        "feasible",
        "unserved",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    header.extend(DestroyOperator::ALL.iter().map(|op| format!("w_{}", op.name())));
    header.extend(RepairOperator::ALL.iter().map(|op| format!("w_{}", op.name())));
    writer.write_record(&header)?;

    for r in log {
        let mut row = vec![
            r.iteration.to_string(),
            format!("{:.4}", r.current_distance),
            format!("{:.4}", r.best_distance),
            format!("{:.4}", r.candidate_distance),
            format!("{:.6}", r.temperature),
            r.destroy.name().to_string(),
            r.repair.name().to_string(),
            r.removal_size.to_string(),
            r.score.number().to_string(),
            r.feasible.to_string(),
            r.unserved.to_string(),
        ];
        row.extend(r.destroy_weights.iter().map(|w| format!("{:.6}", w)));
        row.extend(r.repair_weights.iter().map(|w| format!("{:.6}", w)));
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristics::alns::{Alns, AlnsConfig};
    use crate::instance::fixtures;

    #[test]
    fn test_route_svg() {
        let instance = fixtures::with_oversized_request();
        let result = Alns::new(&instance, AlnsConfig::default().with_iterations(10).with_removal_range(1, 2))
            .unwrap()
            .run();

        let svg = Visualizer::new().generate_route_svg(&instance, &result.best);
        assert!(svg.starts_with("<?xml"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains("oversized"));
        assert!(svg.contains("polyline"));
        assert!(svg.contains(r#"class="unserved""#));
    }

    #[test]
    fn test_history_and_weight_charts() {
        let instance = fixtures::ring(6);
        let result = Alns::new(&instance, AlnsConfig::default().with_iterations(20).with_removal_range(1, 3))
            .unwrap()
            .run();
        let viz = Visualizer::new();

        let history = viz.generate_history_svg(&result.log);
        assert!(history.contains("Distance history"));
        assert_eq!(history.matches("<path").count(), 2);

        let destroy = viz.generate_weights_svg(&result.log, WeightFamily::Destroy);
        assert_eq!(destroy.matches("<path").count(), 4);
        assert!(destroy.contains("Shaw Removal"));

        let repair = viz.generate_weights_svg(&result.log, WeightFamily::Repair);
        assert_eq!(repair.matches("<path").count(), 3);

        // empty log still renders
        assert!(viz.generate_history_svg(&[]).ends_with("</svg>"));
    }

    #[test]
    fn test_export_log_csv() {
        let instance = fixtures::two_requests();
        let result = Alns::new(&instance, AlnsConfig::default().with_iterations(7).with_removal_range(1, 2))
            .unwrap()
            .run();

        let path = std::env::temp_dir().join(format!("pdptw-log-{}.csv", std::process::id()));
        export_log_csv(&result.log, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("iteration,current_distance"));
        assert_eq!(header.split(',').count(), 11 + 4 + 3);
        assert_eq!(lines.count(), 7);
    }
}
