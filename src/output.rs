//! Flat text output: one file per series, one value per line.

use std::fmt::Display;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::types::RunOutput;

fn write_series<T: Display>(path: &Path, values: &[T]) -> Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    for value in values {
        writeln!(file, "{value}")?;
    }
    file.flush()?;
    Ok(())
}

impl RunOutput {
    /// Write every series to `<dir>/<stem>_<SUFFIX>.txt`, e.g. `seq_GX.txt`,
    /// followed by the readout, transmit and trigger timing. Returns the
    /// written paths.
    pub fn write_to_dir<P: AsRef<Path>>(&self, dir: P, stem: &str) -> Result<Vec<PathBuf>> {
        let path = |suffix: &str| dir.as_ref().join(format!("{stem}_{suffix}.txt"));
        let mut written = Vec::new();

        for (&suffix, values) in self.data_type.suffixes().iter().zip(self.series.channels()) {
            let p = path(suffix);
            write_series(&p, values)?;
            written.push(p);
        }

        let times = [
            ("RXTimes", &self.rx_times),
            ("TXCenterTimes", &self.tx_center_times),
            ("TrigTimes", &self.trigger_times),
        ];
        for (suffix, values) in times {
            let p = path(suffix);
            write_series(&p, values)?;
            written.push(p);
        }
        let p = path("RXEventLength");
        write_series(&p, &self.rx_event_length)?;
        written.push(p);

        log::debug!("wrote {} files to {}", written.len(), dir.as_ref().display());
        Ok(written)
    }
}
