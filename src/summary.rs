//! Scalar summaries for offline inspection of a training run.
//!
//! Rows are appended to `<log_dir>/scalars.csv` as
//! `step,tag,value,wall_time`, where `wall_time` is seconds since the writer
//! was created.

use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::error::Result;

pub struct SummaryWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    started: Instant,
}

impl SummaryWriter {
    pub fn create(log_dir: &Path) -> Result<Self> {
        create_dir_all(log_dir)?;
        let path = log_dir.join("scalars.csv");
        let mut writer = BufWriter::new(File::create(&path)?);
        writeln!(writer, "step,tag,value,wall_time")?;
        writer.flush()?;
        Ok(SummaryWriter {
            path,
            writer,
            started: Instant::now(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn add_scalar(&mut self, tag: &str, value: f32, step: u64) -> Result<()> {
        let wall_time = self.started.elapsed().as_secs_f64();
        writeln!(self.writer, "{},{},{},{:.3}", step, tag, value, wall_time)?;
        Ok(())
    }

    pub fn add_scalars(&mut self, scalars: &[(&str, f32)], step: u64) -> Result<()> {
        for (tag, value) in scalars {
            self.add_scalar(tag, *value, step)?;
        }
        self.flush()
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

impl Drop for SummaryWriter {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = SummaryWriter::create(dir.path()).unwrap();
        writer
            .add_scalars(&[("epsilon", 0.5), ("distance100", 12.0)], 42)
            .unwrap();

        let contents = std::fs::read_to_string(writer.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "step,tag,value,wall_time");
        assert!(lines[1].starts_with("42,epsilon,0.5,"));
        assert!(lines[2].starts_with("42,distance100,12,"));
    }
}
