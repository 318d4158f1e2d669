use crate::adapters::http::ShClient;
use crate::config::toml_config::ClientConfig;
use crate::dataimport::{Tpdi, TpdiCollection};
use crate::domain::geo::{BBox, Crs, Geometry, NamedCrs};
use crate::domain::model::{parse_utc, ApiType, GetMapParams, GetStatsParams, MimeType};
use crate::domain::ports::Layer;
use crate::layer::dataset::SH_SERVICE_HOSTNAME;
use crate::layer::LayersFactory;
use crate::utils::error::{Result, ShError};
use crate::utils::validation::{
    validate_non_empty_string, validate_range, validate_required_field, Validate,
};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "sentinelhub")]
#[command(about = "Query Sentinel Hub and OGC imagery services")]
pub struct CliConfig {
    #[arg(long, global = true, help = "Path to a TOML client configuration")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Auth token, overrides the configuration")]
    pub token: Option<String>,

    #[arg(long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// List the layers of a service
    Layers {
        #[arg(long)]
        url: Option<String>,
    },
    /// Print the GetMap URL of a layer
    MapUrl {
        #[command(flatten)]
        target: LayerArgs,
        #[command(flatten)]
        map: MapArgs,
        #[arg(long, value_enum, default_value = "wms")]
        api: ApiArg,
    },
    /// Download an image of a layer
    Map {
        #[command(flatten)]
        target: LayerArgs,
        #[command(flatten)]
        map: MapArgs,
        #[arg(long, value_enum, default_value = "wms")]
        api: ApiArg,
        #[arg(long, short)]
        output: PathBuf,
    },
    /// Search tiles of a layer
    FindTiles {
        #[command(flatten)]
        target: LayerArgs,
        #[command(flatten)]
        area: AreaArgs,
        #[arg(long)]
        max_count: Option<u32>,
        #[arg(long)]
        offset: Option<u32>,
        #[arg(long, help = "Group the tiles by satellite flyover")]
        flyovers: bool,
    },
    /// List the dates with available data
    Dates {
        #[command(flatten)]
        target: LayerArgs,
        #[command(flatten)]
        area: AreaArgs,
    },
    /// Print band statistics as CSV
    Stats {
        #[command(flatten)]
        target: LayerArgs,
        #[command(flatten)]
        area: AreaArgs,
        #[arg(long, help = "Meters per pixel")]
        resolution: f64,
        #[arg(long)]
        bins: Option<u32>,
    },
    /// Show third-party data import quotas
    Quota {
        #[arg(long, value_enum)]
        collection: Option<CollectionArg>,
    },
}

#[derive(Debug, Clone, Args)]
pub struct LayerArgs {
    #[arg(long, help = "Service URL, defaults to the configured instance")]
    pub url: Option<String>,

    #[arg(long)]
    pub layer: String,
}

#[derive(Debug, Clone, Args)]
pub struct AreaArgs {
    #[arg(long, value_parser = parse_bbox, help = "minX,minY,maxX,maxY")]
    pub bbox: [f64; 4],

    #[arg(long, value_enum, default_value = "epsg4326")]
    pub crs: CrsArg,

    #[arg(long, value_parser = parse_time)]
    pub from: DateTime<Utc>,

    #[arg(long, value_parser = parse_time)]
    pub to: DateTime<Utc>,
}

impl AreaArgs {
    pub fn bbox(&self) -> BBox {
        let [min_x, min_y, max_x, max_y] = self.bbox;
        BBox::new(self.crs.into(), min_x, min_y, max_x, max_y)
    }

    pub fn geometry(&self) -> Geometry {
        let [min_x, min_y, max_x, max_y] = self.bbox;
        let ring = vec![
            [min_x, min_y],
            [max_x, min_y],
            [max_x, max_y],
            [min_x, max_y],
            [min_x, min_y],
        ];
        Geometry::Polygon {
            coordinates: vec![ring],
            crs: Some(NamedCrs::from_crs(self.crs.into())),
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct MapArgs {
    #[command(flatten)]
    pub area: AreaArgs,

    #[arg(long, default_value = "512")]
    pub width: u32,

    #[arg(long, default_value = "512")]
    pub height: u32,

    #[arg(long, default_value = "image/png")]
    pub format: String,

    #[arg(long)]
    pub gain: Option<f64>,

    #[arg(long)]
    pub gamma: Option<f64>,
}

impl MapArgs {
    pub fn to_params(&self) -> Result<GetMapParams> {
        Ok(GetMapParams {
            width: self.width,
            height: self.height,
            format: MimeType::parse(&self.format)?,
            gain: self.gain,
            gamma: self.gamma,
            ..GetMapParams::new(self.area.bbox(), self.area.from, self.area.to)
        })
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ApiArg {
    Wms,
    Wmts,
    Processing,
}

impl From<ApiArg> for ApiType {
    fn from(api: ApiArg) -> Self {
        match api {
            ApiArg::Wms => ApiType::Wms,
            ApiArg::Wmts => ApiType::Wmts,
            ApiArg::Processing => ApiType::Processing,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CrsArg {
    Epsg4326,
    Epsg3857,
}

impl From<CrsArg> for Crs {
    fn from(crs: CrsArg) -> Self {
        match crs {
            CrsArg::Epsg4326 => Crs::Epsg4326,
            CrsArg::Epsg3857 => Crs::Epsg3857,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CollectionArg {
    AirbusPhr,
    AirbusSpot,
    PlanetScope,
    MaxarWorldview,
}

impl From<CollectionArg> for TpdiCollection {
    fn from(collection: CollectionArg) -> Self {
        match collection {
            CollectionArg::AirbusPhr => TpdiCollection::AirbusPleiades,
            CollectionArg::AirbusSpot => TpdiCollection::AirbusSpot,
            CollectionArg::PlanetScope => TpdiCollection::PlanetScope,
            CollectionArg::MaxarWorldview => TpdiCollection::MaxarWorldview,
        }
    }
}

fn parse_bbox(value: &str) -> std::result::Result<[f64; 4], String> {
    let parts: Vec<f64> = value
        .split(',')
        .map(|p| p.trim().parse::<f64>().map_err(|e| format!("invalid coordinate '{}': {}", p, e)))
        .collect::<std::result::Result<_, _>>()?;
    match parts.as_slice() {
        [min_x, min_y, max_x, max_y] if min_x < max_x && min_y < max_y => Ok([*min_x, *min_y, *max_x, *max_y]),
        [_, _, _, _] => Err("expected minX < maxX and minY < maxY".to_string()),
        _ => Err(format!("expected 4 comma separated numbers, got {}", parts.len())),
    }
}

fn parse_time(value: &str) -> std::result::Result<DateTime<Utc>, String> {
    parse_utc(value).map_err(|e| e.to_string())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsRow<'a> {
    channel: &'a str,
    date: String,
    min: f64,
    max: f64,
    mean: f64,
    st_dev: f64,
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        if let Some(token) = &self.token {
            validate_non_empty_string("token", token)?;
        }
        match &self.command {
            Command::MapUrl { target, map, .. } | Command::Map { target, map, .. } => {
                validate_non_empty_string("layer", &target.layer)?;
                validate_range("width", map.width, 1, 2500)?;
                validate_range("height", map.height, 1, 2500)?;
                validate_time_range(&map.area)
            }
            Command::FindTiles { target, area, .. }
            | Command::Dates { target, area }
            | Command::Stats { target, area, .. } => {
                validate_non_empty_string("layer", &target.layer)?;
                validate_time_range(area)
            }
            Command::Layers { .. } | Command::Quota { .. } => Ok(()),
        }
    }
}

fn validate_time_range(area: &AreaArgs) -> Result<()> {
    if area.from > area.to {
        return Err(ShError::InvalidConfigValueError {
            field: "from".to_string(),
            value: area.from.to_rfc3339(),
            reason: "must not be after --to".to_string(),
        });
    }
    Ok(())
}

impl CliConfig {
    /// Loads the config file, if any, and applies the command-line overrides.
    pub fn load_client_config(&self) -> Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::from_file(path)?,
            None => ClientConfig::default(),
        };
        if let Some(token) = &self.token {
            config.auth.token = Some(token.clone());
        }
        config.validate()?;
        Ok(config)
    }

    pub async fn run(&self, config: &ClientConfig) -> Result<()> {
        let client = config.build_client();
        config.authenticate(&client).await?;

        match &self.command {
            Command::Layers { url } => {
                let base_url = service_url(url.as_deref(), config)?;
                let layers = LayersFactory::make_layers(&client, &base_url, None).await?;
                for layer in layers {
                    println!(
                        "{}\t{}\t{}",
                        layer.layer_type(),
                        layer.title().unwrap_or("-"),
                        layer.description().unwrap_or("")
                    );
                }
            }
            Command::MapUrl { target, map, api } => {
                let layer = resolve_layer(&client, config, target).await?;
                println!("{}", layer.get_map_url(&map.to_params()?, (*api).into())?);
            }
            Command::Map {
                target,
                map,
                api,
                output,
            } => {
                let layer = resolve_layer(&client, config, target).await?;
                let image = layer.get_map(&client, &map.to_params()?, (*api).into()).await?;
                tokio::fs::write(output, &image).await?;
                tracing::info!("🖼️ Saved {} bytes to {}", image.len(), output.display());
            }
            Command::FindTiles {
                target,
                area,
                max_count,
                offset,
                flyovers,
            } => {
                let layer = resolve_layer(&client, config, target).await?;
                let result = layer
                    .find_tiles(&client, &area.bbox(), area.from, area.to, *max_count, *offset)
                    .await?;
                let output = if *flyovers {
                    serde_json::to_string_pretty(&layer.group_tiles_by_flyovers(&result.tiles)?)?
                } else {
                    serde_json::to_string_pretty(&result)?
                };
                println!("{}", output);
            }
            Command::Dates { target, area } => {
                let layer = resolve_layer(&client, config, target).await?;
                let dates = layer.find_dates_utc(&client, &area.bbox(), area.from, area.to).await?;
                for date in dates {
                    println!("{}", date.to_rfc3339());
                }
            }
            Command::Stats {
                target,
                area,
                resolution,
                bins,
            } => {
                let layer = resolve_layer(&client, config, target).await?;
                let params = GetStatsParams {
                    geometry: Some(area.geometry()),
                    from_time: Some(area.from),
                    to_time: Some(area.to),
                    resolution: Some(*resolution),
                    bins: *bins,
                };
                let stats = layer.get_stats(&client, &params).await?;

                let mut writer = csv::Writer::from_writer(std::io::stdout());
                for (channel, days) in &stats {
                    for day in days {
                        writer.serialize(StatsRow {
                            channel,
                            date: day.date.to_rfc3339(),
                            min: day.basic_stats.min,
                            max: day.basic_stats.max,
                            mean: day.basic_stats.mean,
                            st_dev: day.basic_stats.st_dev,
                        })?;
                    }
                }
                writer.flush()?;
            }
            Command::Quota { collection } => {
                let tpdi = Tpdi::new(client);
                let quotas = match collection {
                    Some(c) => tpdi.get_quota((*c).into()).await?,
                    None => tpdi.get_quotas().await?,
                };
                for quota in quotas {
                    println!(
                        "{}\t{:.2} / {:.2} km²",
                        quota.collection_id, quota.quota_used, quota.quota_sqkm
                    );
                }
            }
        }
        Ok(())
    }
}

fn service_url(url: Option<&str>, config: &ClientConfig) -> Result<String> {
    if let Some(url) = url {
        return Ok(url.to_string());
    }
    let instance_id = validate_required_field("service.instance_id", &config.service.instance_id)?;
    let host = config
        .service
        .hostname
        .as_deref()
        .unwrap_or(SH_SERVICE_HOSTNAME);
    Ok(format!("{}ogc/wms/{}", host, instance_id))
}

async fn resolve_layer(client: &ShClient, config: &ClientConfig, target: &LayerArgs) -> Result<Box<dyn Layer>> {
    let base_url = service_url(target.url.as_deref(), config)?;
    let wanted = target.layer.clone();
    let filter: &(dyn Fn(&str) -> bool + Send + Sync) = &move |id: &str| id == wanted;

    let mut layers = LayersFactory::make_layers(client, &base_url, Some(filter)).await?;
    layers
        .pop()
        .ok_or_else(|| ShError::validation(format!("Layer {} not found at {}", target.layer, base_url)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bbox() {
        assert_eq!(parse_bbox("14.4, 45.9,14.7,46.1").unwrap(), [14.4, 45.9, 14.7, 46.1]);
        assert!(parse_bbox("1,2,3").is_err());
        assert!(parse_bbox("3,2,1,4").is_err());
        assert!(parse_bbox("a,b,c,d").is_err());
    }

    #[test]
    fn test_parse_map_url_command() {
        let cli = CliConfig::try_parse_from([
            "sentinelhub",
            "map-url",
            "--layer",
            "TRUE_COLOR",
            "--bbox",
            "14.4,45.9,14.7,46.1",
            "--from",
            "2020-01-01",
            "--to",
            "2020-02-01T00:00:00Z",
            "--gain",
            "2",
        ])
        .unwrap();

        assert!(cli.validate().is_ok());
        let Command::MapUrl { target, map, api } = cli.command else {
            panic!("expected map-url");
        };
        assert_eq!(target.layer, "TRUE_COLOR");
        assert!(matches!(api, ApiArg::Wms));
        let params = map.to_params().unwrap();
        assert_eq!(params.gain, Some(2.0));
        assert_eq!(params.width, 512);
        assert_eq!(params.bbox.unwrap().to_array(), [14.4, 45.9, 14.7, 46.1]);
    }

    #[test]
    fn test_reversed_time_range_is_invalid() {
        let cli = CliConfig::try_parse_from([
            "sentinelhub",
            "dates",
            "--layer",
            "L",
            "--bbox",
            "0,0,1,1",
            "--from",
            "2020-02-01",
            "--to",
            "2020-01-01",
        ])
        .unwrap();
        assert!(matches!(
            cli.validate(),
            Err(ShError::InvalidConfigValueError { .. })
        ));
    }

    #[test]
    fn test_service_url_from_config() {
        let config = ClientConfig::from_toml_str("[service]\ninstance_id = \"abc\"\n").unwrap();
        assert_eq!(
            service_url(None, &config).unwrap(),
            "https://services.sentinel-hub.com/ogc/wms/abc"
        );
        assert_eq!(service_url(Some("https://x/wmts"), &config).unwrap(), "https://x/wmts");
        assert!(matches!(
            service_url(None, &ClientConfig::default()),
            Err(ShError::MissingConfigError { .. })
        ));
    }

    #[test]
    fn test_area_geometry_is_closed_polygon() {
        let area = AreaArgs {
            bbox: [0.0, 0.0, 1.0, 2.0],
            crs: CrsArg::Epsg4326,
            from: parse_time("2020-01-01").unwrap(),
            to: parse_time("2020-01-02").unwrap(),
        };
        let Geometry::Polygon { coordinates, crs } = area.geometry() else {
            panic!("expected polygon");
        };
        assert_eq!(coordinates[0].first(), coordinates[0].last());
        assert_eq!(crs.unwrap().properties.name, "urn:ogc:def:crs:EPSG::4326");
    }
}
