//! Map document rendering and writing
//!
//! `MapRenderer` turns prepared layers into a viewable document;
//! `LeafletRenderer` does it with minijinja templates producing standalone
//! Leaflet HTML pages. `ArtifactWriter` derives file names, writes into the
//! maps directory (atomically) and hands back `MapArtifact`s.

use crate::error::{MapError, MapResult};
use crate::models::artifact::{rolling_file_name, single_day_file_name};
use crate::models::{
    Coordinates, DateContext, HeatmapTimeline, LocatedRecord, LocationCount, MapArtifact,
    NeighborhoodCount,
};
use chrono::{NaiveDate, NaiveDateTime};
use minijinja::{context, Environment, Value};
use serde::Serialize;
use std::path::{Path, PathBuf};
use svo_common::{fs_utils, time};
use tracing::info;

/// Label of the combined index document in the batch result
pub const INDEX_LABEL: &str = "Combinado";

/// File name of the combined index document
pub const INDEX_FILE_NAME: &str = "mmaps.html";

/// Static heat layer for one date context
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotLayer {
    pub title: String,
    pub center: Coordinates,
    pub zoom: u8,
    pub locations: Vec<LocationCount>,
}

impl SnapshotLayer {
    /// `Mapa de Calor | {city} | {DD/MM/YYYY or Sem Data}`
    pub fn title_for(city: &str, context: &DateContext) -> String {
        format!("Mapa de Calor | {} | {}", city, context.display_label())
    }
}

/// One order shown as a clustered marker on the rolling map
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderMarker {
    pub lat: f64,
    pub lon: f64,
    pub order_id: String,
    pub neighborhood: String,
    pub city: String,
    /// `DD/MM/YYYY`
    pub day: String,
    pub status: Option<String>,
}

impl From<&LocatedRecord> for OrderMarker {
    fn from(item: &LocatedRecord) -> Self {
        let record = &item.record;
        Self {
            lat: item.coordinates.latitude,
            lon: item.coordinates.longitude,
            order_id: record.order_id.clone(),
            neighborhood: record.neighborhood.clone().unwrap_or_default(),
            city: record.city.clone().unwrap_or_default(),
            day: record.scheduled_day().map(time::day_label).unwrap_or_default(),
            status: record.status.clone(),
        }
    }
}

/// Animated day-indexed heat layer plus markers and summary
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineLayer {
    pub title: String,
    pub center: Coordinates,
    pub zoom: u8,
    pub timeline: HeatmapTimeline,
    pub orders: Vec<OrderMarker>,
    pub summary: Vec<NeighborhoodCount>,
}

impl TimelineLayer {
    /// `Mapa de Calor Geral | {city} | {today} à {window end}`
    pub fn title_for(city: &str, today: NaiveDate, window_end: NaiveDate) -> String {
        format!(
            "Mapa de Calor Geral | {} | {} à {}",
            city,
            time::day_label(today),
            time::day_label(window_end)
        )
    }
}

/// Rendering backend
pub trait MapRenderer: Send + Sync {
    fn render_snapshot(&self, layer: &SnapshotLayer) -> MapResult<String>;

    fn render_timeline(&self, layer: &TimelineLayer) -> MapResult<String>;

    /// Page embedding the given maps; paths are referenced by file name
    fn render_index(&self, maps: &[MapArtifact]) -> MapResult<String>;
}

/// Leaflet HTML renderer backed by minijinja templates
pub struct LeafletRenderer {
    env: Environment<'static>,
}

impl LeafletRenderer {
    pub fn new() -> MapResult<Self> {
        let mut env = Environment::new();
        env.add_template("_head.html", include_str!("../../templates/_head.html"))?;
        env.add_template("snapshot.html", include_str!("../../templates/snapshot.html"))?;
        env.add_template("timeline.html", include_str!("../../templates/timeline.html"))?;
        env.add_template("index.html", include_str!("../../templates/index.html"))?;
        Ok(Self { env })
    }

    fn render(&self, name: &str, ctx: Value) -> MapResult<String> {
        Ok(self.env.get_template(name)?.render(ctx)?)
    }
}

/// JSON for inline `<script>` use, marked safe so autoescape leaves it alone
///
/// Markup characters only occur inside string literals, so they are written
/// as `\uXXXX` escapes: the script block cannot be closed early and the
/// decoded strings are unchanged.
fn script_json<T: Serialize + ?Sized>(value: &T) -> MapResult<Value> {
    let json = serde_json::to_string(value)
        .map_err(|e| MapError::Render(format!("serialize layer data: {}", e)))?;
    Ok(Value::from_safe_string(
        json.replace('<', "\\u003c")
            .replace('>', "\\u003e")
            .replace('&', "\\u0026"),
    ))
}

#[derive(Serialize)]
struct SnapshotMarker {
    lat: f64,
    lon: f64,
    tooltip: String,
}

impl MapRenderer for LeafletRenderer {
    fn render_snapshot(&self, layer: &SnapshotLayer) -> MapResult<String> {
        let points: Vec<_> = layer.locations.iter().map(LocationCount::heat_point).collect();
        let markers: Vec<SnapshotMarker> = layer
            .locations
            .iter()
            .map(|l| SnapshotMarker {
                lat: l.coordinates.latitude,
                lon: l.coordinates.longitude,
                tooltip: l.tooltip(),
            })
            .collect();
        let max_count = layer.locations.iter().map(|l| l.count).max().unwrap_or(1);

        self.render(
            "snapshot.html",
            context! {
                title => &layer.title,
                center_lat => layer.center.latitude,
                center_lon => layer.center.longitude,
                zoom => layer.zoom,
                max_count => max_count,
                points_json => script_json(&points)?,
                markers_json => script_json(&markers)?,
            },
        )
    }

    fn render_timeline(&self, layer: &TimelineLayer) -> MapResult<String> {
        let max_count = layer
            .timeline
            .frames
            .iter()
            .flat_map(|f| f.points.iter().map(|p| p.count))
            .max()
            .unwrap_or(1);

        self.render(
            "timeline.html",
            context! {
                title => &layer.title,
                center_lat => layer.center.latitude,
                center_lon => layer.center.longitude,
                zoom => layer.zoom,
                max_count => max_count,
                last_frame => layer.timeline.frames.len().saturating_sub(1),
                labels_json => script_json(&layer.timeline.labels())?,
                frames_json => script_json(&layer.timeline.frame_data())?,
                orders_json => script_json(&layer.orders)?,
                summary => &layer.summary,
            },
        )
    }

    fn render_index(&self, maps: &[MapArtifact]) -> MapResult<String> {
        let entries: Vec<Value> = maps
            .iter()
            .map(|m| {
                let file_name = m
                    .path
                    .file_name()
                    .map(|f| f.to_string_lossy().into_owned())
                    .unwrap_or_default();
                context! { label => &m.label, file_name => file_name }
            })
            .collect();

        self.render("index.html", context! { maps => entries })
    }
}

/// Writes rendered documents into the maps directory
pub struct ArtifactWriter<R> {
    renderer: R,
    maps_dir: PathBuf,
}

impl<R: MapRenderer> ArtifactWriter<R> {
    pub fn new(renderer: R, maps_dir: impl Into<PathBuf>) -> Self {
        Self {
            renderer,
            maps_dir: maps_dir.into(),
        }
    }

    pub fn maps_dir(&self) -> &Path {
        &self.maps_dir
    }

    /// Write `{city}_{YYYYMMDD|sem_data}.html`, labeled with the city
    pub fn write_snapshot(
        &self,
        city: &str,
        context: &DateContext,
        layer: &SnapshotLayer,
    ) -> MapResult<MapArtifact> {
        let html = self.renderer.render_snapshot(layer)?;
        self.write(city.to_string(), &single_day_file_name(city, context), &html)
    }

    /// Write `{city}_geral{YYYYMMDDHHMM}.html` under `label`
    pub fn write_timeline(
        &self,
        city: &str,
        label: String,
        generated_at: NaiveDateTime,
        layer: &TimelineLayer,
    ) -> MapResult<MapArtifact> {
        let html = self.renderer.render_timeline(layer)?;
        self.write(label, &rolling_file_name(city, generated_at), &html)
    }

    /// Write the combined `mmaps.html` page
    pub fn write_index(&self, maps: &[MapArtifact]) -> MapResult<MapArtifact> {
        let html = self.renderer.render_index(maps)?;
        self.write(INDEX_LABEL.to_string(), INDEX_FILE_NAME, &html)
    }

    fn write(&self, label: String, file_name: &str, html: &str) -> MapResult<MapArtifact> {
        let path = self.maps_dir.join(file_name);
        fs_utils::write_atomic(&path, html.as_bytes())?;

        info!(label = %label, path = %path.display(), bytes = html.len(), "Wrote map");
        Ok(MapArtifact { label, path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HeatPoint, HeatmapFrame};
    use tempfile::TempDir;

    fn snapshot_layer() -> SnapshotLayer {
        SnapshotLayer {
            title: SnapshotLayer::title_for("Campinas", &DateContext::Unscheduled),
            center: Coordinates::new(-22.9, -47.06),
            zoom: 12,
            locations: vec![LocationCount {
                coordinates: Coordinates::new(-22.9, -47.06),
                count: 3,
                neighborhoods: vec!["Centro".to_string()],
            }],
        }
    }

    fn timeline_layer() -> TimelineLayer {
        let day = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        TimelineLayer {
            title: TimelineLayer::title_for("Campinas", day, time::add_days(day, 10)),
            center: Coordinates::new(-22.9, -47.06),
            zoom: 12,
            timeline: HeatmapTimeline {
                frames: vec![HeatmapFrame {
                    day,
                    label: time::day_label(day),
                    points: vec![HeatPoint {
                        coordinates: Coordinates::new(-22.9, -47.06),
                        count: 2,
                    }],
                }],
            },
            orders: vec![OrderMarker {
                lat: -22.9,
                lon: -47.06,
                order_id: "SVO-1".to_string(),
                neighborhood: "<Centro>".to_string(),
                city: "Campinas".to_string(),
                day: "07/03/2025".to_string(),
                status: None,
            }],
            summary: vec![NeighborhoodCount {
                neighborhood: "Centro & Vila".to_string(),
                count: 2,
            }],
        }
    }

    #[test]
    fn test_snapshot_document_contents() {
        let html = LeafletRenderer::new()
            .unwrap()
            .render_snapshot(&snapshot_layer())
            .unwrap();

        assert!(html.contains("Mapa de Calor | Campinas | Sem Data"));
        assert!(html.contains("[[-22.9,-47.06,3]]"));
        assert!(html.contains("Centro: 3 O.S."));
        assert!(html.contains("leaflet-heat.js"));
    }

    #[test]
    fn test_timeline_document_contents() {
        let html = LeafletRenderer::new()
            .unwrap()
            .render_timeline(&timeline_layer())
            .unwrap();

        // Autoescape turns '/' into an entity inside the title
        assert!(html.contains("Mapa de Calor Geral | Campinas | "));
        assert!(html.contains(r#"["07/03/2025"]"#));
        assert!(html.contains("[[[-22.9,-47.06,2]]]"));
        assert!(html.contains("Centro &amp; Vila"));
        assert!(html.contains("markercluster"));
    }

    #[test]
    fn test_script_json_cannot_close_script_tag() {
        let value = script_json("</script><b>").unwrap();
        assert!(!value.to_string().contains("</script>"));
    }

    #[test]
    fn test_script_json_keeps_decoded_text() {
        let value = script_json("Vila <A> & B").unwrap();
        let json = value.to_string();
        assert!(!json.contains('<'));
        assert!(!json.contains('&'));

        let decoded: String = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, "Vila <A> & B");
    }

    #[test]
    fn test_snapshot_tooltip_markup_is_not_rendered_as_html() {
        let mut layer = snapshot_layer();
        layer.locations[0].neighborhoods = vec!["<img src=x onerror=alert(1)>".to_string()];

        let html = LeafletRenderer::new()
            .unwrap()
            .render_snapshot(&layer)
            .unwrap();

        assert!(!html.contains("<img src=x"));
        assert!(html.contains(r"\u003cimg src=x onerror=alert(1)\u003e: 3 O.S."));
        assert!(html.contains("bindTooltip(escapeHtml(m.tooltip))"));
        assert!(html.contains("function escapeHtml"));
    }

    #[test]
    fn test_writer_names_and_labels_files() {
        let dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(LeafletRenderer::new().unwrap(), dir.path());

        let snapshot = writer
            .write_snapshot("São Paulo", &DateContext::Unscheduled, &snapshot_layer())
            .unwrap();
        assert_eq!(snapshot.label, "São Paulo");
        assert_eq!(snapshot.path, dir.path().join("São_Paulo_sem_data.html"));
        assert!(snapshot.path.exists());

        let generated_at = NaiveDate::from_ymd_opt(2025, 3, 7)
            .unwrap()
            .and_hms_opt(8, 5, 0)
            .unwrap();
        let rolling = writer
            .write_timeline(
                "Campinas",
                "Campinas (Futuros 10 dias)".to_string(),
                generated_at,
                &timeline_layer(),
            )
            .unwrap();
        assert_eq!(rolling.path, dir.path().join("Campinas_geral202503070805.html"));

        let index = writer.write_index(&[snapshot]).unwrap();
        assert_eq!(index.label, INDEX_LABEL);
        let html = std::fs::read_to_string(&index.path).unwrap();
        assert!(html.contains(r#"src="São_Paulo_sem_data.html""#));
        assert!(html.contains("Mapa de São Paulo"));
    }
}
