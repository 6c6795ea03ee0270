//! Command dispatch and the text rendering of map commands
//!
//! The CLI stands in for the drawing surface: render commands are printed
//! instead of drawn.

pub mod logging;
mod settings;

pub use settings::{Command, Settings};

use guide_map_lib::{
    CategoryFilter, GeoPoint, GuideSession, MapLayer, PointOfInterest, RenderCommand, TileIndex,
    all_categories,
};
use serde::Serialize;

/// Whether results are printed as JSON or as text
struct Output {
    json: bool,
}

impl Output {
    fn emit<T: Serialize + ?Sized>(&self, value: &T, text: impl FnOnce() -> String) -> anyhow::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            let text = text();
            if !text.is_empty() {
                println!("{text}");
            }
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct TileEntry {
    tile: TileIndex,
    imagery: bool,
}

pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let config = settings.to_config()?;
    let mut session = GuideSession::open(config)?;
    let out = Output {
        json: settings.json,
    };

    match settings.command {
        Command::Pois { categories, all } => {
            let controller = session.controller_mut();
            if all {
                controller.select_all_categories();
            } else if !categories.is_empty() {
                controller.set_filter(CategoryFilter::with_selected(categories));
            }
            let visible = controller.visible_pois();
            out.emit(&visible, || {
                visible
                    .iter()
                    .map(|poi| describe_poi(poi))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }
        Command::Categories => {
            let categories = all_categories(session.controller().pois());
            out.emit(&categories, || categories.join("\n"))
        }
        Command::Routes => {
            let routes = session.controller().routes();
            out.emit(routes, || {
                routes
                    .iter()
                    .map(|r| {
                        format!(
                            "{}  {}  {}  {}",
                            r.name,
                            r.format_distance(),
                            r.duration_label,
                            r.description
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }
        Command::Route { name } => {
            let commands = session.controller_mut().try_select_route(&name)?;
            out.emit(&commands, || describe_commands(&commands))
        }
        Command::Tiles => {
            let controller = session.controller();
            let store = session.store();
            let range = controller.visible_tiles();
            let tiles: Vec<TileEntry> = range
                .iter()
                .map(|tile| TileEntry {
                    tile,
                    imagery: store.has_imagery(tile),
                })
                .collect();
            out.emit(&tiles, || {
                let with_imagery = tiles.iter().filter(|t| t.imagery).count();
                let mut lines = vec![format!(
                    "{} tile(s) at zoom {}, {with_imagery} with imagery",
                    tiles.len(),
                    range.zoom
                )];
                lines.extend(tiles.iter().map(|t| {
                    format!("{}  {}", t.tile, if t.imagery { "imagery" } else { "empty" })
                }));
                lines.join("\n")
            })
        }
        Command::Tap { title, lat, lon } => {
            let commands = session
                .controller()
                .tap_annotation(&title, GeoPoint::new(lat, lon));
            out.emit(&commands, || {
                if commands.is_empty() {
                    format!("No point of interest '{title}' at ({lat}, {lon})")
                } else {
                    describe_commands(&commands)
                }
            })
        }
        Command::Prefetch => {
            let handle = session.start_prefetch();
            let cancel = handle.cancel_token();
            let ctrl_c = tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupted, cancelling prefetch");
                    cancel.cancel();
                }
            });

            let mut progress = handle.subscribe();
            let reporter = tokio::spawn(async move {
                while progress.changed().await.is_ok() {
                    let p = *progress.borrow_and_update();
                    tracing::debug!(
                        zoom = ?p.zoom,
                        "Prefetch progress {}/{}",
                        p.processed,
                        p.total
                    );
                }
            });

            let report = handle.wait().await?;
            ctrl_c.abort();
            reporter.abort();
            out.emit(&report, || {
                format!(
                    "{} copied, {} already cached, {} missing, {} failed{}",
                    report.copied,
                    report.already_cached,
                    report.missing,
                    report.failed,
                    if report.cancelled { " (cancelled)" } else { "" }
                )
            })
        }
    }
}

fn describe_poi(poi: &PointOfInterest) -> String {
    format!(
        "{}  {}  [{}]",
        poi.title,
        poi.location,
        poi.categories.join(", ")
    )
}

fn describe_commands(commands: &[RenderCommand]) -> String {
    commands
        .iter()
        .map(describe_command)
        .collect::<Vec<_>>()
        .join("\n")
}

fn describe_command(command: &RenderCommand) -> String {
    match command {
        RenderCommand::SetViewport(v) => format!(
            "set viewport: centre {} span {:.4} x {:.4}",
            v.center, v.lat_span, v.lon_span
        ),
        RenderCommand::ReplacePoiMarkers(layers) => {
            format!("replace poi markers:{}", describe_layers(layers))
        }
        RenderCommand::ReplaceRouteOverlay(layers) => {
            format!("replace route overlay:{}", describe_layers(layers))
        }
        RenderCommand::ClearRouteOverlay => "clear route overlay".to_string(),
        RenderCommand::RequestTiles(range) => format!(
            "request {} tile(s) at zoom {}: x {}..={}, y {}..={}",
            range.len(),
            range.zoom,
            range.min_x,
            range.max_x,
            range.min_y,
            range.max_y
        ),
        RenderCommand::ShowPoiDetail(poi) => {
            let mut lines = vec![format!("show detail: {}", describe_poi(poi))];
            if !poi.description.is_empty() {
                lines.push(format!("  {}", poi.description));
            }
            for (label, value) in [
                ("directions", &poi.directions),
                ("image", &poi.image),
                ("audio", &poi.audio),
            ] {
                if let Some(value) = value {
                    lines.push(format!("  {label}: {value}"));
                }
            }
            lines.join("\n")
        }
    }
}

fn describe_layers(layers: &[MapLayer]) -> String {
    if layers.is_empty() {
        return " (none)".to_string();
    }
    layers
        .iter()
        .map(|layer| format!("\n  {}", describe_layer(layer)))
        .collect()
}

fn describe_layer(layer: &MapLayer) -> String {
    match layer {
        MapLayer::TileLayer { tiles } => {
            format!("tiles at zoom {} ({} tile(s))", tiles.zoom, tiles.len())
        }
        MapLayer::RoutePolyline { route, points } => {
            format!("{route}: polyline through {} point(s)", points.len())
        }
        MapLayer::RouteMarker { route, at } => format!("{route}: start marker at {at}"),
        MapLayer::DirectionalIndicator { route, indicator } => format!(
            "{route}: direction {:.1}° at {}",
            indicator.bearing, indicator.at
        ),
        MapLayer::PoiMarker {
            title,
            location,
            style,
        } => format!("{title} at {location} ({style:?}, {})", style.hex()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guide_map_lib::{CategoryStyle, DirectionIndicator};

    #[test]
    fn test_describe_layers() {
        let at = GeoPoint::new(50.9, -1.4);
        assert_eq!(
            describe_layer(&MapLayer::DirectionalIndicator {
                route: "Walls".to_string(),
                indicator: DirectionIndicator { at, bearing: 90.0 },
            }),
            "Walls: direction 90.0° at (50.900000, -1.400000)"
        );
        assert_eq!(
            describe_layer(&MapLayer::PoiMarker {
                title: "Bargate".to_string(),
                location: at,
                style: CategoryStyle::Historic,
            }),
            "Bargate at (50.900000, -1.400000) (Historic, #a52a2a)"
        );
        assert_eq!(describe_command(&RenderCommand::ClearRouteOverlay), "clear route overlay");
        assert_eq!(
            describe_command(&RenderCommand::ReplaceRouteOverlay(Vec::new())),
            "replace route overlay: (none)"
        );
    }
}
