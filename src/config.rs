use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cooldown::DEFAULT_COOLDOWN;
use crate::describe::DEFAULT_DESCRIPTION_PROMPT;
use crate::detect::{VehicleClass, DETECTOR_BACKENDS, OCR_BACKENDS};
use crate::pipeline::PipelineSettings;
use crate::tracking::{
    TrackerSettings, DEFAULT_HISTORY_CAPACITY, DEFAULT_IDLE_TIMEOUT, DEFAULT_MIN_VOTES,
    DEFAULT_MISMATCH_THRESHOLD,
};

const DEFAULT_DB_PATH: &str = "plate_gate.db";
const DEFAULT_SOURCE_URI: &str = "stub://gate_camera";
const DEFAULT_TARGET_FPS: u32 = 10;
const DEFAULT_BACKEND: &str = "stub";
const DEFAULT_MODEL_INPUT_SIZE: u32 = 640;
const DEFAULT_VEHICLE_CONFIDENCE: f32 = 0.5;
const DEFAULT_PLATE_CONFIDENCE: f32 = 0.2;
const DEFAULT_MIN_VEHICLE_AREA: i64 = 5000;
const DEFAULT_OCR_EVERY_N_FRAMES: u64 = 3;
const DEFAULT_OCR_LANGUAGE: &str = "eng";
const DEFAULT_DESCRIPTION_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Deserialize, Default)]
struct GateConfigFile {
    db_path: Option<String>,
    source: Option<SourceConfigFile>,
    detection: Option<DetectionConfigFile>,
    ocr: Option<OcrConfigFile>,
    tracking: Option<TrackingConfigFile>,
    cooldown: Option<CooldownConfigFile>,
    description: Option<DescriptionConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    uri: Option<String>,
    target_fps: Option<u32>,
    max_frames: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    vehicle_backend: Option<String>,
    plate_backend: Option<String>,
    vehicle_model: Option<PathBuf>,
    plate_model: Option<PathBuf>,
    model_input_size: Option<u32>,
    vehicle_confidence: Option<f32>,
    plate_confidence: Option<f32>,
    vehicle_classes: Option<Vec<u32>>,
    min_vehicle_area: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
struct OcrConfigFile {
    backend: Option<String>,
    every_n_frames: Option<u64>,
    data_path: Option<String>,
    language: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct TrackingConfigFile {
    history_capacity: Option<usize>,
    min_votes: Option<usize>,
    mismatch_threshold: Option<u32>,
    idle_timeout_secs: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct CooldownConfigFile {
    seconds: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct DescriptionConfigFile {
    endpoint: Option<String>,
    timeout_secs: Option<u64>,
    prompt: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GateConfig {
    pub db_path: String,
    pub source: SourceSettings,
    pub detection: DetectionSettings,
    pub ocr: OcrSettings,
    pub tracking: TrackerSettings,
    pub idle_timeout: Duration,
    pub cooldown: Duration,
    pub description: DescriptionSettings,
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub uri: String,
    pub target_fps: u32,
    /// Synthetic sources end after this many frames when set.
    pub max_frames: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct DetectionSettings {
    pub vehicle_backend: String,
    pub plate_backend: String,
    pub vehicle_model: Option<PathBuf>,
    pub plate_model: Option<PathBuf>,
    pub model_input_size: u32,
    pub vehicle_confidence: f32,
    pub plate_confidence: f32,
    pub vehicle_classes: Vec<VehicleClass>,
    /// Vehicles must cover strictly more than this many pixels.
    pub min_vehicle_area: i64,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            vehicle_backend: DEFAULT_BACKEND.to_string(),
            plate_backend: DEFAULT_BACKEND.to_string(),
            vehicle_model: None,
            plate_model: None,
            model_input_size: DEFAULT_MODEL_INPUT_SIZE,
            vehicle_confidence: DEFAULT_VEHICLE_CONFIDENCE,
            plate_confidence: DEFAULT_PLATE_CONFIDENCE,
            vehicle_classes: VehicleClass::ALL.to_vec(),
            min_vehicle_area: DEFAULT_MIN_VEHICLE_AREA,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OcrSettings {
    pub backend: String,
    pub every_n_frames: u64,
    pub data_path: Option<String>,
    pub language: String,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            backend: DEFAULT_BACKEND.to_string(),
            every_n_frames: DEFAULT_OCR_EVERY_N_FRAMES,
            data_path: None,
            language: DEFAULT_OCR_LANGUAGE.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DescriptionSettings {
    /// No endpoint means every description is "unavailable".
    pub endpoint: Option<String>,
    pub timeout: Duration,
    pub prompt: String,
}

impl Default for DescriptionSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout: Duration::from_secs(DEFAULT_DESCRIPTION_TIMEOUT_SECS),
            prompt: DEFAULT_DESCRIPTION_PROMPT.to_string(),
        }
    }
}

impl GateConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("PLATE_GATE_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: GateConfigFile) -> Result<Self> {
        let db_path = file.db_path.unwrap_or_else(|| DEFAULT_DB_PATH.to_string());

        let source_file = file.source.unwrap_or_default();
        let source = SourceSettings {
            uri: source_file
                .uri
                .unwrap_or_else(|| DEFAULT_SOURCE_URI.to_string()),
            target_fps: source_file.target_fps.unwrap_or(DEFAULT_TARGET_FPS),
            max_frames: source_file.max_frames,
        };

        let defaults = DetectionSettings::default();
        let det = file.detection.unwrap_or_default();
        let vehicle_classes = match det.vehicle_classes {
            Some(ids) => parse_vehicle_classes(&ids)?,
            None => defaults.vehicle_classes,
        };
        let detection = DetectionSettings {
            vehicle_backend: det.vehicle_backend.unwrap_or(defaults.vehicle_backend),
            plate_backend: det.plate_backend.unwrap_or(defaults.plate_backend),
            vehicle_model: det.vehicle_model,
            plate_model: det.plate_model,
            model_input_size: det.model_input_size.unwrap_or(defaults.model_input_size),
            vehicle_confidence: det
                .vehicle_confidence
                .unwrap_or(defaults.vehicle_confidence),
            plate_confidence: det.plate_confidence.unwrap_or(defaults.plate_confidence),
            vehicle_classes,
            min_vehicle_area: det.min_vehicle_area.unwrap_or(defaults.min_vehicle_area),
        };

        let ocr_defaults = OcrSettings::default();
        let ocr_file = file.ocr.unwrap_or_default();
        let ocr = OcrSettings {
            backend: ocr_file.backend.unwrap_or(ocr_defaults.backend),
            every_n_frames: ocr_file
                .every_n_frames
                .unwrap_or(ocr_defaults.every_n_frames),
            data_path: ocr_file.data_path,
            language: ocr_file.language.unwrap_or(ocr_defaults.language),
        };

        let tracking_file = file.tracking.unwrap_or_default();
        let tracking = TrackerSettings {
            history_capacity: tracking_file
                .history_capacity
                .unwrap_or(DEFAULT_HISTORY_CAPACITY),
            min_votes: tracking_file.min_votes.unwrap_or(DEFAULT_MIN_VOTES),
            mismatch_threshold: tracking_file
                .mismatch_threshold
                .unwrap_or(DEFAULT_MISMATCH_THRESHOLD),
        };
        let idle_timeout = match tracking_file.idle_timeout_secs {
            Some(secs) => seconds("tracking.idle_timeout_secs", secs)?,
            None => DEFAULT_IDLE_TIMEOUT,
        };
        let cooldown = match file.cooldown.and_then(|c| c.seconds) {
            Some(secs) => seconds("cooldown.seconds", secs)?,
            None => DEFAULT_COOLDOWN,
        };

        let desc_defaults = DescriptionSettings::default();
        let desc_file = file.description.unwrap_or_default();
        let description = DescriptionSettings {
            endpoint: desc_file.endpoint.filter(|e| !e.trim().is_empty()),
            timeout: desc_file
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(desc_defaults.timeout),
            prompt: desc_file.prompt.unwrap_or(desc_defaults.prompt),
        };

        Ok(Self {
            db_path,
            source,
            detection,
            ocr,
            tracking,
            idle_timeout,
            cooldown,
            description,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("PLATE_GATE_DB_PATH") {
            if !path.trim().is_empty() {
                self.db_path = path;
            }
        }
        if let Ok(uri) = std::env::var("PLATE_GATE_SOURCE") {
            if !uri.trim().is_empty() {
                self.source.uri = uri;
            }
        }
        if let Ok(raw) = std::env::var("PLATE_GATE_COOLDOWN_SECS") {
            let secs: f64 = raw.trim().parse().map_err(|_| {
                anyhow!("PLATE_GATE_COOLDOWN_SECS must be a number of seconds")
            })?;
            self.cooldown = seconds("PLATE_GATE_COOLDOWN_SECS", secs)?;
        }
        if let Ok(raw) = std::env::var("PLATE_GATE_IDLE_TIMEOUT_SECS") {
            let secs: f64 = raw.trim().parse().map_err(|_| {
                anyhow!("PLATE_GATE_IDLE_TIMEOUT_SECS must be a number of seconds")
            })?;
            self.idle_timeout = seconds("PLATE_GATE_IDLE_TIMEOUT_SECS", secs)?;
        }
        if let Ok(url) = std::env::var("PLATE_GATE_DESCRIBE_URL") {
            if !url.trim().is_empty() {
                self.description.endpoint = Some(url);
            }
        }
        if let Ok(path) = std::env::var("PLATE_GATE_VEHICLE_MODEL") {
            if !path.trim().is_empty() {
                self.detection.vehicle_model = Some(PathBuf::from(path));
            }
        }
        if let Ok(path) = std::env::var("PLATE_GATE_PLATE_MODEL") {
            if !path.trim().is_empty() {
                self.detection.plate_model = Some(PathBuf::from(path));
            }
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.db_path.trim().is_empty() {
            return Err(anyhow!("db_path must not be empty"));
        }
        if self.source.target_fps == 0 {
            return Err(anyhow!("source.target_fps must be greater than zero"));
        }
        for (name, value) in [
            ("vehicle_backend", &self.detection.vehicle_backend),
            ("plate_backend", &self.detection.plate_backend),
        ] {
            if !DETECTOR_BACKENDS.contains(&value.as_str()) {
                return Err(anyhow!(
                    "detection.{} must be one of: {}",
                    name,
                    DETECTOR_BACKENDS.join(", ")
                ));
            }
        }
        if !OCR_BACKENDS.contains(&self.ocr.backend.as_str()) {
            return Err(anyhow!(
                "ocr.backend must be one of: {}",
                OCR_BACKENDS.join(", ")
            ));
        }
        if self.detection.vehicle_classes.is_empty() {
            return Err(anyhow!("detection.vehicle_classes must not be empty"));
        }
        if self.detection.min_vehicle_area < 0 {
            return Err(anyhow!("detection.min_vehicle_area must not be negative"));
        }
        if self.detection.model_input_size == 0 {
            return Err(anyhow!("detection.model_input_size must be greater than zero"));
        }
        if self.description.timeout.is_zero() {
            return Err(anyhow!("description.timeout_secs must be greater than zero"));
        }
        // Remaining numeric invariants are enforced by the constructors.
        self.pipeline_settings().validate()?;
        Ok(())
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            vehicle_classes: self.detection.vehicle_classes.clone(),
            vehicle_confidence: self.detection.vehicle_confidence,
            plate_confidence: self.detection.plate_confidence,
            min_vehicle_area: self.detection.min_vehicle_area,
            ocr_every_n_frames: self.ocr.every_n_frames,
            tracker: self.tracking,
            idle_timeout: self.idle_timeout,
        }
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.source.target_fps))
    }
}

fn read_config_file(path: &Path) -> Result<GateConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn parse_vehicle_classes(ids: &[u32]) -> Result<Vec<VehicleClass>> {
    ids.iter()
        .map(|&id| {
            VehicleClass::from_coco_id(id)
                .ok_or_else(|| anyhow!("detection.vehicle_classes: {} is not a vehicle class", id))
        })
        .collect()
}

fn seconds(name: &str, secs: f64) -> Result<Duration> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(anyhow!("{} must be a positive number of seconds", name));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|e| anyhow!("{} is out of range ({} s): {}", name, secs, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let mut cfg = GateConfig::from_file(GateConfigFile::default()).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.db_path, DEFAULT_DB_PATH);
        assert_eq!(cfg.source.uri, DEFAULT_SOURCE_URI);
        assert_eq!(cfg.ocr.every_n_frames, 3);
        assert_eq!(cfg.tracking.history_capacity, 20);
        assert_eq!(cfg.tracking.min_votes, 3);
        assert_eq!(cfg.tracking.mismatch_threshold, 3);
        assert_eq!(cfg.idle_timeout, Duration::from_secs(3));
        assert_eq!(cfg.cooldown, Duration::from_secs(10));
        assert_eq!(cfg.detection.min_vehicle_area, 5000);
        assert_eq!(cfg.detection.vehicle_classes, VehicleClass::ALL.to_vec());
        assert!(cfg.description.endpoint.is_none());
    }

    #[test]
    fn rejects_non_vehicle_class() {
        let file = GateConfigFile {
            detection: Some(DetectionConfigFile {
                vehicle_classes: Some(vec![2, 0]),
                ..DetectionConfigFile::default()
            }),
            ..GateConfigFile::default()
        };
        let err = GateConfig::from_file(file).err().unwrap();
        assert!(err.to_string().contains("not a vehicle class"));
    }

    #[test]
    fn rejects_zero_ocr_interval() {
        let file = GateConfigFile {
            ocr: Some(OcrConfigFile {
                every_n_frames: Some(0),
                ..OcrConfigFile::default()
            }),
            ..GateConfigFile::default()
        };
        let mut cfg = GateConfig::from_file(file).unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_non_positive_durations() {
        assert!(seconds("cooldown.seconds", 0.0).is_err());
        assert!(seconds("cooldown.seconds", -1.0).is_err());
        assert!(seconds("cooldown.seconds", f64::NAN).is_err());
        assert!(seconds("cooldown.seconds", f64::INFINITY).is_err());
        assert!(seconds("cooldown.seconds", 1e30).is_err());
        assert!(seconds("tracking.idle_timeout_secs", f64::MAX).is_err());
        assert_eq!(seconds("cooldown.seconds", 2.5).unwrap(), Duration::from_millis(2500));
    }

    #[test]
    fn parses_toml_sections() {
        let raw = r#"
            db_path = "gate.db"

            [source]
            uri = "stub://north_gate"
            target_fps = 5

            [tracking]
            idle_timeout_secs = 4.5
        "#;
        let file: GateConfigFile = toml::from_str(raw).unwrap();
        let cfg = GateConfig::from_file(file).unwrap();
        assert_eq!(cfg.db_path, "gate.db");
        assert_eq!(cfg.source.uri, "stub://north_gate");
        assert_eq!(cfg.source.target_fps, 5);
        assert_eq!(cfg.idle_timeout, Duration::from_millis(4500));
        assert_eq!(cfg.frame_interval(), Duration::from_millis(200));
    }
}
