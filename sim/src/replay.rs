//! Replay: serialize/deserialize recorded detection logs for offline runs.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracker_core::{metrics::GroundTruth, types::Detection};

/// A full recorded run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplayLog {
    pub scenario_name: String,
    pub seed: u64,
    /// Seconds between frames
    pub frame_dt: f64,
    /// Frames in chronological order
    pub frames: Vec<ReplayFrame>,
}

/// Detector output and ground truth for one frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplayFrame {
    pub index: u64,
    pub time: f64,
    pub detections: Vec<Detection>,
    /// Empty for logs recorded from a real detector
    #[serde(default)]
    pub ground_truth: Vec<GroundTruth>,
}

impl ReplayLog {
    pub fn total_detections(&self) -> usize {
        self.frames.iter().map(|f| f.detections.len()).sum()
    }
}

pub fn write_replay<W: Write>(log: &ReplayLog, writer: W) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(writer, log).context("serializing replay log")?;
    Ok(())
}

pub fn read_replay<R: Read>(reader: R) -> anyhow::Result<ReplayLog> {
    serde_json::from_reader(reader).context("parsing replay log")
}

/// Save a replay log to a JSON file.
pub fn save_replay(log: &ReplayLog, path: &Path) -> anyhow::Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating replay file {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    write_replay(log, &mut writer)?;
    writer.flush().context("flushing replay file")?;
    Ok(())
}

/// Load a replay log from a JSON file.
pub fn load_replay(path: &Path) -> anyhow::Result<ReplayLog> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("opening replay file {}", path.display()))?;
    read_replay(BufReader::new(file))
        .with_context(|| format!("loading replay file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::{Scenario, ScenarioKind};

    #[test]
    fn recorded_log_survives_json() {
        let log = Scenario::build(ScenarioKind::Attack, 11).record();
        let mut buf = Vec::new();
        write_replay(&log, &mut buf).unwrap();
        let back = read_replay(buf.as_slice()).unwrap();
        assert_eq!(back, log);
    }

    #[test]
    fn save_and_load_file() {
        let log = Scenario::build(ScenarioKind::Hover, 2).record();
        let path = std::env::temp_dir()
            .join(format!("dronewatch-replay-{}.json", std::process::id()));
        save_replay(&log, &path).unwrap();
        let back = load_replay(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(back.frames.len(), log.frames.len());
        assert_eq!(back.total_detections(), log.total_detections());
    }

    #[test]
    fn ground_truth_is_optional() {
        let json = r#"{
            "scenario_name": "camera",
            "seed": 0,
            "frame_dt": 0.04,
            "frames": [ { "index": 0, "time": 0.0,
                          "detections": [ { "bbox_xyxy": [1.0, 2.0, 3.0, 4.0] } ] } ]
        }"#;
        let log = read_replay(json.as_bytes()).unwrap();
        assert_eq!(log.total_detections(), 1);
        assert!(log.frames[0].ground_truth.is_empty());
        assert_eq!(log.frames[0].detections[0].confidence, None);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_replay(Path::new("/nonexistent/replay.json")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/replay.json"));
    }
}
