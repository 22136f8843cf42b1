use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{Result, RollcallError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000/api".into(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    pub register_surface: String,
    pub capture_surface: String,
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub facing_mode: String,
    pub register_jpeg_quality: u8,
    pub capture_jpeg_quality: u8,
    /// Serve frames from this image instead of a capture device.
    #[serde(default)]
    pub source_image: Option<String>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            register_surface: "register-video".into(),
            capture_surface: "capture-video".into(),
            ideal_width: 1280,
            ideal_height: 720,
            facing_mode: "user".into(),
            register_jpeg_quality: 90,
            capture_jpeg_quality: 95,
            source_image: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseConfig {
    pub name: String,
    pub code: String,
    /// Denominator of the attendance preview shown right after a scan.
    pub expected_class_size: u32,
}

impl Default for CourseConfig {
    fn default() -> Self {
        Self {
            name: "Interface Homme Machine".into(),
            code: "ANI-IA 4057".into(),
            expected_class_size: 45,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpsConfig {
    pub log_level: String,
    pub activity_capacity: usize,
}

impl Default for OpsConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            activity_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RollcallConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub course: CourseConfig,
    #[serde(default)]
    pub ops: OpsConfig,
}

impl RollcallConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref).map_err(|err| {
            RollcallError::Configuration(format!(
                "unable to read config file {}: {err}",
                path_ref.display()
            ))
        })?;
        toml::from_str(&contents).map_err(|err| {
            RollcallError::Configuration(format!(
                "failed to parse config file {}: {err}",
                path_ref.display()
            ))
        })
    }

    pub fn validate(&self) -> Result<()> {
        let base_url = self.api.base_url.trim();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(config_error("api.base_url must be an http(s) URL"));
        }
        if self.api.timeout_secs == 0 {
            return Err(config_error("api.timeout_secs must be greater than zero"));
        }
        if self.camera.register_surface.is_empty() || self.camera.capture_surface.is_empty() {
            return Err(config_error("camera surfaces must be named"));
        }
        if self.camera.register_surface == self.camera.capture_surface {
            return Err(config_error(
                "camera.register_surface and camera.capture_surface must differ",
            ));
        }
        if self.camera.ideal_width == 0 || self.camera.ideal_height == 0 {
            return Err(config_error("camera ideal dimensions must be non-zero"));
        }
        for quality in [
            self.camera.register_jpeg_quality,
            self.camera.capture_jpeg_quality,
        ] {
            if !(1..=100).contains(&quality) {
                return Err(config_error("camera JPEG qualities must be between 1 and 100"));
            }
        }
        if self.course.name.trim().is_empty() || self.course.code.trim().is_empty() {
            return Err(config_error("course.name and course.code are required"));
        }
        if self.course.expected_class_size == 0 {
            return Err(config_error(
                "course.expected_class_size must be greater than zero",
            ));
        }
        if self.ops.activity_capacity == 0 {
            return Err(config_error("ops.activity_capacity must be greater than zero"));
        }
        Ok(())
    }
}

fn config_error(message: &str) -> RollcallError {
    RollcallError::Configuration(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn load_rollcall_config_from_file() {
        let temp_path = std::env::temp_dir().join("rollcall-config-test.toml");
        let mut config = RollcallConfig::default();
        config.api.base_url = "http://attendance.local/api".into();
        config.course.expected_class_size = 30;
        config.camera.source_image = Some("room.jpg".into());

        let doc = toml::to_string(&config).expect("serialize config");
        fs::write(&temp_path, doc).expect("write temp config");

        let loaded = RollcallConfig::from_file(&temp_path).expect("load config");
        assert_eq!(loaded.api.base_url, config.api.base_url);
        assert_eq!(loaded.course.expected_class_size, 30);
        assert_eq!(loaded.camera.source_image.as_deref(), Some("room.jpg"));
        fs::remove_file(&temp_path).expect("cleanup temp config");
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let loaded: RollcallConfig = toml::from_str(
            r#"
            [course]
            name = "Compilers"
            code = "CS-401"
            expected_class_size = 12
            "#,
        )
        .expect("parse partial config");
        assert_eq!(loaded.course.code, "CS-401");
        assert_eq!(loaded.api.timeout_secs, 30);
        assert_eq!(loaded.camera.capture_surface, "capture-video");
        assert!(loaded.validate().is_ok());
    }

    #[test]
    fn validate_configuration_rules() {
        let mut config = RollcallConfig::default();
        assert!(config.validate().is_ok());

        config.api.base_url = "ftp://nope".into();
        assert!(config.validate().is_err());
        config.api.base_url = "https://attendance.local/api".into();
        config.api.timeout_secs = 0;
        assert!(config.validate().is_err());
        config.api.timeout_secs = 10;
        config.camera.capture_surface = config.camera.register_surface.clone();
        assert!(config.validate().is_err());
        config.camera.capture_surface = "capture-video".into();
        config.camera.capture_jpeg_quality = 0;
        assert!(config.validate().is_err());
        config.camera.capture_jpeg_quality = 95;
        config.course.expected_class_size = 0;
        assert!(config.validate().is_err());
        config.course.expected_class_size = 45;
        config.ops.activity_capacity = 0;
        assert!(config.validate().is_err());
        config.ops.activity_capacity = 64;
        assert!(config.validate().is_ok());
    }
}
