use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub socket: SocketConfig,
    pub capture: CaptureConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SocketConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    /// Capture tool executable, resolved via PATH.
    pub binary: String,
    pub sample_rate: u32,
    pub channels: u16,
    /// Explicit input device; `None` means the system default input.
    pub device: Option<String>,
    /// Amplitude below which input counts as silence (sox notation, e.g. "3%").
    pub silence_threshold: String,
    /// Seconds of silence after detected sound before the tool auto-stops.
    pub silence_duration_secs: f64,
    /// How long to wait for a graceful exit before force-killing.
    pub stop_timeout_secs: u64,
}

impl Config {
    /// Load configuration: built-in defaults, then an optional TOML file,
    /// then `RECD_*` environment overrides (e.g. `RECD_CAPTURE__DEVICE`).
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder()
            .set_default("socket.path", "/tmp/recd.sock")?
            .set_default("capture.binary", "sox")?
            .set_default("capture.sample_rate", 44100)?
            .set_default("capture.channels", 1)?
            .set_default("capture.silence_threshold", "3%")?
            .set_default("capture.silence_duration_secs", 3.0)?
            .set_default("capture.stop_timeout_secs", 5)?;

        if let Some(file) = file {
            let name = file.to_str().context("config path is not valid UTF-8")?;
            builder = builder.add_source(config::File::with_name(name));
        }

        let settings = builder
            .add_source(config::Environment::with_prefix("RECD").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

impl CaptureConfig {
    pub fn stop_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.stop_timeout_secs)
    }

    /// Arguments for the capture tool: input selection, mono/rate settings,
    /// output path, and silence-based auto-stop.
    pub fn capture_args(&self, output_path: &Path) -> Vec<String> {
        let mut args = Vec::new();

        match &self.device {
            // sox device syntax: `-t coreaudio <name>` selects a named input
            Some(device) => {
                args.push("-t".to_string());
                args.push("coreaudio".to_string());
                args.push(device.clone());
            }
            None => args.push("-d".to_string()),
        }

        args.push("-c".to_string());
        args.push(self.channels.to_string());
        args.push("-r".to_string());
        args.push(self.sample_rate.to_string());
        args.push(output_path.display().to_string());

        // Auto-stop after silence_duration_secs of sub-threshold input
        // following at least 0.1s of detected sound.
        let duration = format!("{:.1}", self.silence_duration_secs);
        for arg in [
            "silence",
            "1",
            "0.1",
            &self.silence_threshold,
            "1",
            &duration,
            &self.silence_threshold,
        ] {
            args.push(arg.to_string());
        }

        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_config_file() {
        let cfg = Config::load(None).expect("defaults should load");

        assert_eq!(cfg.socket.path, PathBuf::from("/tmp/recd.sock"));
        assert_eq!(cfg.capture.binary, "sox");
        assert_eq!(cfg.capture.sample_rate, 44100);
        assert_eq!(cfg.capture.channels, 1);
        assert!(cfg.capture.device.is_none());
        assert_eq!(cfg.capture.stop_timeout_secs, 5);
    }

    #[test]
    fn capture_args_use_default_input_when_no_device() {
        let cfg = Config::load(None).expect("defaults should load");
        let args = cfg.capture.capture_args(Path::new("/tmp/out.wav"));

        assert_eq!(
            args,
            vec![
                "-d", "-c", "1", "-r", "44100", "/tmp/out.wav", "silence", "1", "0.1", "3%", "1",
                "3.0", "3%",
            ]
        );
    }

    #[test]
    fn capture_args_select_configured_device() {
        let mut cfg = Config::load(None).expect("defaults should load");
        cfg.capture.device = Some("External Mic".to_string());

        let args = cfg.capture.capture_args(Path::new("/tmp/out.wav"));
        assert_eq!(&args[..3], &["-t", "coreaudio", "External Mic"]);
    }
}
