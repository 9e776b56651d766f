use crate::error::BenchResult;
use crate::pipeline::RunMetrics;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

pub const CSV_HEADER: &str = "detector,descriptor,image_id,n_keypoint,n_match,t_detector,t_descriptor";

/// Receives the metrics of every completed configuration
pub trait ReportSink {
    fn record(&mut self, detector: &str, descriptor: &str, metrics: &RunMetrics) -> BenchResult<()>;

    fn flush(&mut self) -> BenchResult<()> {
        Ok(())
    }
}

/// Appends one row per frame to a CSV file.
///
/// The header is written once per opened report, so repeated runs against
/// the same file leave one header per run.
pub struct CsvReport<W: Write> {
    out: W,
}

impl CsvReport<BufWriter<File>> {
    pub fn append<P: AsRef<Path>>(path: P) -> BenchResult<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Self::new(BufWriter::new(file))
    }
}

impl<W: Write> CsvReport<W> {
    pub fn new(mut out: W) -> BenchResult<Self> {
        writeln!(out, "{}", CSV_HEADER)?;
        Ok(Self { out })
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ReportSink for CsvReport<W> {
    fn record(&mut self, detector: &str, descriptor: &str, metrics: &RunMetrics) -> BenchResult<()> {
        for i in 0..metrics.len() {
            writeln!(
                self.out,
                "{},{},{},{},{},{:.6},{:.6}",
                detector,
                descriptor,
                i,
                metrics.keypoint_counts[i],
                metrics.match_counts[i],
                metrics.detect_times[i],
                metrics.describe_times[i]
            )?;
        }
        Ok(())
    }

    fn flush(&mut self) -> BenchResult<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// Human-readable per-frame table on stdout
#[derive(Debug, Default)]
pub struct ConsoleReport;

impl ConsoleReport {
    pub fn format(detector: &str, descriptor: &str, metrics: &RunMetrics) -> String {
        let mut s = format!("Detector: {} | Descriptor: {}\n", detector, descriptor);
        for i in 0..metrics.len() {
            s.push_str(&format!(
                "{}, {}, {}, {:.6}, {:.6}\n",
                i, metrics.keypoint_counts[i], metrics.match_counts[i], metrics.detect_times[i], metrics.describe_times[i]
            ));
        }
        s
    }
}

impl ReportSink for ConsoleReport {
    fn record(&mut self, detector: &str, descriptor: &str, metrics: &RunMetrics) -> BenchResult<()> {
        print!("{}", Self::format(detector, descriptor, metrics));
        Ok(())
    }
}

/// Forwards every record to several sinks
#[derive(Default)]
pub struct MultiReport {
    sinks: Vec<Box<dyn ReportSink>>,
}

impl MultiReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Box<dyn ReportSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl ReportSink for MultiReport {
    fn record(&mut self, detector: &str, descriptor: &str, metrics: &RunMetrics) -> BenchResult<()> {
        for sink in &mut self.sinks {
            sink.record(detector, descriptor, metrics)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> BenchResult<()> {
        for sink in &mut self.sinks {
            sink.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::FrameMetrics;

    fn metrics() -> RunMetrics {
        let mut m = RunMetrics::default();
        m.push(FrameMetrics { keypoints: 12, matches: 0, detect_time: 0.0015, describe_time: 0.25 });
        m.push(FrameMetrics { keypoints: 10, matches: 7, detect_time: 0.002, describe_time: 0.0000004 });
        m
    }

    #[test]
    fn test_csv_rows() {
        let mut report = CsvReport::new(Vec::new()).unwrap();
        report.record("FAST", "BRIEF", &metrics()).unwrap();
        let text = String::from_utf8(report.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec![CSV_HEADER, "FAST,BRIEF,0,12,0,0.001500,0.250000", "FAST,BRIEF,1,10,7,0.002000,0.000000"]);
    }

    #[test]
    fn test_append_keeps_previous_runs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("experiment.csv");
        for _ in 0..2 {
            let mut report = CsvReport::append(&path).unwrap();
            report.record("ORB", "ORB", &metrics()).unwrap();
            report.flush().unwrap();
        }
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().filter(|l| *l == CSV_HEADER).count(), 2);
        assert_eq!(text.lines().count(), 6);
    }

    #[test]
    fn test_console_format() {
        let s = ConsoleReport::format("SIFT", "SIFT", &metrics());
        assert!(s.starts_with("Detector: SIFT | Descriptor: SIFT\n"));
        assert!(s.contains("1, 10, 7, 0.002000, 0.000000"));
    }
}
