use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("No profile configured for region '{0}'")]
    UnknownRegion(String),
    #[error("Unsupported coordinate reference system: {0}")]
    UnknownCrs(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("Projection error: {0}")]
    Projection(String),
    #[error("Failed to parse region config: {0}")]
    ConfigParse(#[from] toml::de::Error),
    #[error("GeoJSON error: {0}")]
    GeoJsonError(String),
}
