use crate::particle::Particle;
use crate::stats::RunSummary;
use anyhow::{Context, Result};
use log::{debug, info};
use particle_common::{SimParams, Snapshot, SnapshotFormat, TrajectoryArchive};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Receives the particle positions on every save step.
pub trait SnapshotSink {
    fn record(&mut self, step: u32, params: &SimParams, particles: &[Particle]) -> Result<()>;

    /// Called once after the last step.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Formats a float like Go's `%g` with shortest precision: plain decimal for exponents in
/// `[-4, 6)`, otherwise `d.ddde±XX` with at least two exponent digits.
#[derive(Debug, Clone, Copy)]
pub struct General(pub f64);

impl fmt::Display for General {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.0;
        if v.is_nan() {
            return f.write_str("NaN");
        }
        if v.is_infinite() {
            return f.write_str(if v > 0.0 { "+Inf" } else { "-Inf" });
        }
        if v == 0.0 {
            return f.write_str(if v.is_sign_negative() { "-0" } else { "0" });
        }

        // Shortest round-trip digits with the decimal exponent split off
        let sci = format!("{:e}", v);
        let (mantissa, exp) = sci.split_once('e').ok_or(fmt::Error)?;
        let exp: i32 = exp.parse().map_err(|_| fmt::Error)?;
        if (-4..6).contains(&exp) {
            write!(f, "{}", v)
        } else {
            let sign = if exp < 0 { '-' } else { '+' };
            write!(f, "{}e{}{:02}", mantissa, sign, exp.abs())
        }
    }
}

/// Streams the plain-text trajectory: a `"<n> <size>"` header before the first snapshot,
/// then one `"<x> <y>"` line per particle in store order for every snapshot.
pub struct TextTrajectory<W: Write> {
    writer: W,
    header_written: bool,
}

impl TextTrajectory<BufWriter<File>> {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create trajectory file '{}'", path.display()))?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> TextTrajectory<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, header_written: false }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> SnapshotSink for TextTrajectory<W> {
    fn record(&mut self, _step: u32, params: &SimParams, particles: &[Particle]) -> Result<()> {
        if !self.header_written {
            writeln!(self.writer, "{} {}", particles.len(), General(params.size))?;
            self.header_written = true;
        }
        for p in particles {
            writeln!(self.writer, "{} {}", General(p.x), General(p.y))?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

fn snapshot_of(step: u32, params: &SimParams, particles: &[Particle]) -> Snapshot {
    Snapshot {
        step,
        time: (step + 1) as f64 * params.dt,
        positions: particles.iter().map(|p| (p.x, p.y)).collect(),
    }
}

// Keeps snapshots in memory
impl SnapshotSink for Vec<Snapshot> {
    fn record(&mut self, step: u32, params: &SimParams, particles: &[Particle]) -> Result<()> {
        self.push(snapshot_of(step, params, particles));
        Ok(())
    }
}

/// Collects every snapshot and serializes them in one piece when the run finishes.
pub struct SnapshotArchive {
    format: SnapshotFormat,
    path: PathBuf,
    archive: TrajectoryArchive,
}

impl SnapshotArchive {
    pub fn new<P: Into<PathBuf>>(format: SnapshotFormat, path: P, params: &SimParams) -> Result<Self> {
        if format == SnapshotFormat::Text {
            anyhow::bail!("Text trajectories are streamed, not archived.");
        }
        Ok(Self {
            format,
            path: path.into(),
            archive: TrajectoryArchive {
                num_particles: params.num_particles,
                size: params.size,
                snapshots: Vec::new(),
            },
        })
    }

    pub fn archive(&self) -> &TrajectoryArchive {
        &self.archive
    }
}

impl SnapshotSink for SnapshotArchive {
    fn record(&mut self, step: u32, params: &SimParams, particles: &[Particle]) -> Result<()> {
        debug!("Archiving snapshot at step {}.", step);
        self.archive.snapshots.push(snapshot_of(step, params, particles));
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let file = File::create(&self.path)
            .with_context(|| format!("Failed to create snapshot file '{}'", self.path.display()))?;
        let mut writer = BufWriter::new(file);
        write_archive(self.format, &self.archive, &mut writer)?;
        writer.flush()?;
        info!(
            "{} snapshots saved to {} ({:?} format)",
            self.archive.snapshots.len(),
            self.path.display(),
            self.format
        );
        Ok(())
    }
}

/// Serializes an archive in one of the binary or JSON formats.
pub fn write_archive<W: Write>(format: SnapshotFormat, archive: &TrajectoryArchive, mut writer: W) -> Result<()> {
    match format {
        SnapshotFormat::Json => serde_json::to_writer(&mut writer, archive)
            .context("Error serializing snapshots to JSON")?,
        SnapshotFormat::Bincode => bincode::serialize_into(&mut writer, archive)
            .context("Error serializing snapshots to bincode")?,
        SnapshotFormat::MessagePack => rmp_serde::encode::write(&mut writer, archive)
            .context("Error serializing snapshots to MessagePack")?,
        SnapshotFormat::Text => anyhow::bail!("Text trajectories are streamed, not archived."),
    }
    Ok(())
}

/// Builds the sink for the configured output format.
pub fn open_sink(format: SnapshotFormat, path: &str, params: &SimParams) -> Result<Box<dyn SnapshotSink>> {
    Ok(match format {
        SnapshotFormat::Text => Box::new(TextTrajectory::create(path)?),
        other => Box::new(SnapshotArchive::new(other, path, params)?),
    })
}

/// Writes final particle positions as CSV with an `x,y` header.
pub fn write_final_positions<W: Write>(writer: W, particles: &[Particle]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(["x", "y"])?;
    for p in particles {
        csv_writer.write_record([General(p.x).to_string(), General(p.y).to_string()])?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn save_final_positions<P: AsRef<Path>>(path: P, particles: &[Particle]) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("Error creating CSV file '{}'", path.display()))?;
    write_final_positions(file, particles)?;
    info!("Final positions saved to {}", path.display());
    Ok(())
}

pub fn save_summary<P: AsRef<Path>>(path: P, summary: &RunSummary) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("Error creating summary file '{}'", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), summary)
        .context("Error serializing run summary to JSON")?;
    info!("Run summary saved to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use particle_common::SimulationConfig;

    fn params_for(n: usize) -> SimParams {
        let mut config = SimulationConfig::default();
        config.initial_conditions.num_particles = n;
        config.get_sim_params()
    }

    #[test]
    fn general_format_matches_percent_g() {
        let cases = [
            (0.5, "0.5"),
            (0.0, "0"),
            (1.0, "1"),
            (0.0001, "0.0001"),
            (0.00012, "0.00012"),
            (1e-5, "1e-05"),
            (2.5e-10, "2.5e-10"),
            (100000.0, "100000"),
            (123456.5, "123456.5"),
            (1e6, "1e+06"),
            (1234567.0, "1.234567e+06"),
            (1e100, "1e+100"),
            (-3.75e-7, "-3.75e-07"),
            (0.1 + 0.2, "0.30000000000000004"),
        ];
        for (value, expected) in cases {
            assert_eq!(General(value).to_string(), expected, "formatting {:e}", value);
        }
        assert_eq!(General(f64::NAN).to_string(), "NaN");
        assert_eq!(General(f64::INFINITY).to_string(), "+Inf");
    }

    #[test]
    fn text_trajectory_writes_header_once() {
        let params = params_for(2);
        let particles = vec![Particle::at(0.25, 0.5), Particle::at(1e-5, 0.003)];
        let mut sink = TextTrajectory::new(Vec::new());
        sink.record(0, &params, &particles).unwrap();
        sink.record(10, &params, &particles).unwrap();
        sink.finish().unwrap();

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 1 + 2 * 2);
        assert_eq!(lines[0], format!("2 {}", General(params.size)));
        assert_eq!(lines[1], "0.25 0.5");
        assert_eq!(lines[2], "1e-05 0.003");
        assert_eq!(lines[3..], lines[1..3]);
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn archive_round_trips_through_each_format() {
        let params = params_for(2);
        let particles = vec![Particle::at(0.1, 0.2), Particle::at(0.3, 0.0)];
        let mut snapshots: Vec<Snapshot> = Vec::new();
        snapshots.record(0, &params, &particles).unwrap();
        let archive = TrajectoryArchive { num_particles: 2, size: params.size, snapshots };

        let mut json = Vec::new();
        write_archive(SnapshotFormat::Json, &archive, &mut json).unwrap();
        assert_eq!(serde_json::from_slice::<TrajectoryArchive>(&json).unwrap(), archive);

        let mut bin = Vec::new();
        write_archive(SnapshotFormat::Bincode, &archive, &mut bin).unwrap();
        assert_eq!(bincode::deserialize::<TrajectoryArchive>(&bin).unwrap(), archive);

        let mut msgpack = Vec::new();
        write_archive(SnapshotFormat::MessagePack, &archive, &mut msgpack).unwrap();
        assert_eq!(rmp_serde::from_slice::<TrajectoryArchive>(&msgpack).unwrap(), archive);

        assert!(write_archive(SnapshotFormat::Text, &archive, Vec::<u8>::new()).is_err());
    }

    #[test]
    fn archive_sink_collects_every_snapshot() {
        let params = params_for(2);
        let particles = vec![Particle::at(0.1, 0.2), Particle::at(0.3, 0.0)];
        assert!(SnapshotArchive::new(SnapshotFormat::Text, "unused", &params).is_err());

        let mut sink = SnapshotArchive::new(SnapshotFormat::Json, "unused", &params).unwrap();
        sink.record(0, &params, &particles).unwrap();
        sink.record(10, &params, &particles).unwrap();
        let archive = sink.archive();
        assert_eq!(archive.num_particles, 2);
        assert_eq!(archive.size, params.size);
        let steps: Vec<u32> = archive.snapshots.iter().map(|s| s.step).collect();
        assert_eq!(steps, vec![0, 10]);
        assert_eq!(archive.snapshots[1].positions, vec![(0.1, 0.2), (0.3, 0.0)]);
    }

    #[test]
    fn final_positions_csv() {
        let particles = vec![Particle::at(0.5, 0.25), Particle::at(0.125, 1e-6)];
        let mut out = Vec::new();
        write_final_positions(&mut out, &particles).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "x,y\n0.5,0.25\n0.125,1e-06\n");
    }
}
