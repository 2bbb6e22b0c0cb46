//! Dense gradient waveforms from DSV files, as written by the vendor
//! sequence simulation next to the sequence: `<stem>_GRX.dsv`,
//! `<stem>_GRY.dsv` and `<stem>_GRZ.dsv`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::{AxisSeries, RASTER_TIME};

#[derive(Debug)]
pub struct DsvFile {
    path: PathBuf,
    pub definitions: HashMap<String, String>,
    pub values: Vec<i64>,
}

impl DsvFile {
    /// Load `<stem>_<which_dsv>.dsv` from the directory of `path`.
    pub fn load<P: AsRef<Path>>(path: P, which_dsv: &str) -> Result<Self> {
        let path = path.as_ref();
        let file_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| Error::Dsv {
                path: path.to_owned(),
                reason: "path has no file name".to_owned(),
            })?;
        let file_path = path.with_file_name(format!("{file_name}_{which_dsv}.dsv"));
        let file_buf = std::fs::read(&file_path).map_err(|err| Error::Dsv {
            path: file_path.clone(),
            reason: err.to_string(),
        })?;
        Self::parse(file_path, &String::from_utf8_lossy(&file_buf))
    }

    pub fn parse(path: PathBuf, file_str: &str) -> Result<Self> {
        let section = |name: &str| {
            file_str
                .split('[')
                .find(|s| s.starts_with(name))
                .ok_or_else(|| Error::Dsv {
                    path: path.clone(),
                    reason: format!("missing [{name}] section"),
                })
        };

        let definitions = section("DEFINITIONS")?
            .lines()
            .skip(1)
            .filter(|l| !l.trim().is_empty())
            .map_while(|def| def.split_once('=')) // stop at first non-def
            .map(|(key, val)| (key.trim().to_owned(), val.trim().to_owned()))
            .collect();

        let values = section("VALUES")?
            .lines()
            .skip(1)
            .map_while(|s| s.trim().parse().ok())
            .collect();

        Ok(Self {
            path,
            definitions,
            values,
        })
    }

    fn error(&self, reason: String) -> Error {
        Error::Dsv {
            path: self.path.clone(),
            reason,
        }
    }

    pub fn definition(&self, key: &str) -> Result<&str> {
        self.definitions
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| self.error(format!("missing definition {key}")))
    }

    fn parse_definition<T: std::str::FromStr>(&self, key: &str) -> Result<T> {
        let value = self.definition(key)?;
        value
            .parse()
            .map_err(|_| self.error(format!("cannot parse {key} = {value:?}")))
    }

    /// Sample spacing. Unit: `s`
    pub fn time_step(&self) -> Result<f64> {
        let time_unit = match self.definitions.get("HORIUNITNAME") {
            Some(unit) => hori_unit_si_factor(unit)
                .ok_or_else(|| self.error(format!("unknown time unit {unit:?}")))?,
            None => 1e-6,
        };
        Ok(self.parse_definition::<f64>("HORIDELTA")? * time_unit)
    }

    /// Amplitude of one integer step. Unit: `mT/m`
    pub fn amp_step(&self) -> Result<f64> {
        let amp_unit = match self.definitions.get("VERTUNITNAME") {
            Some(unit) => vert_unit_mt_per_m(unit)
                .ok_or_else(|| self.error(format!("unknown gradient unit {unit:?}")))?,
            None => 1.0,
        };
        Ok(amp_unit / self.parse_definition::<f64>("VERTFACTOR")?)
    }

    /// The decompressed waveform. Unit: `mT/m`
    pub fn gradient(&self) -> Result<Vec<f64>> {
        let num_samples: usize = self.parse_definition("SAMPLES")?;
        let amp_step = self.amp_step()?;
        let samples = decompress_shape(&self.values, num_samples)
            .map_err(|len| self.error(format!("decompressed {len} samples, expected {num_samples}")))?;
        Ok(samples.into_iter().map(|x| x as f64 * amp_step).collect())
    }
}

fn vert_unit_mt_per_m(unit: &str) -> Option<f64> {
    match unit {
        "mT/m" => Some(1.0),
        "T/m" => Some(1e3),
        _ => None,
    }
}

fn hori_unit_si_factor(unit: &str) -> Option<f64> {
    match unit {
        "s" => Some(1e0),
        "ms" => Some(1e-3),
        "µs" | "μs" | "�s" | "us" => Some(1e-6),
        "ns" => Some(1e-9),
        _ => None,
    }
}

/// Undo the DSV compression: values are stored as the run-length encoded
/// derivative of the waveform. Two equal samples in a row are followed by
/// the repetition count of that sample. On a length mismatch the
/// decompressed length is returned as error.
pub fn decompress_shape(samples: &[i64], num_samples: usize) -> std::result::Result<Vec<i64>, usize> {
    let mut deriv = Vec::with_capacity(num_samples);

    // The two samples before the current one, to detect RLE
    let mut a = i64::MIN;
    let mut b = i64::MAX;
    // After a detected RLE, skip the RLE check for two samples
    let mut skip = 0;

    for &sample in samples {
        if a == b && skip == 0 {
            skip = 2;
            for _ in 0..sample.max(0) {
                deriv.push(b);
            }
        } else {
            if skip > 0 {
                skip -= 1;
            }
            deriv.push(sample);
        }

        a = b;
        b = sample;
    }

    if deriv.len() != num_samples {
        return Err(deriv.len());
    }

    Ok(deriv
        .into_iter()
        .scan(0, |acc, x| {
            *acc += x;
            Some(*acc)
        })
        .collect())
}

/// Load the X, Y and Z gradients belonging to `path`. All three must be
/// sampled on the gradient raster and have the same length.
pub fn load_gradients<P: AsRef<Path>>(path: P) -> Result<AxisSeries> {
    let mut axes = Vec::with_capacity(3);
    for which in ["GRX", "GRY", "GRZ"] {
        let dsv = DsvFile::load(&path, which)?;
        let time_step = dsv.time_step()?;
        if ((time_step - RASTER_TIME) / RASTER_TIME).abs() > 1e-6 {
            return Err(dsv.error(format!(
                "sampled every {time_step} s, expected the {RASTER_TIME} s gradient raster"
            )));
        }
        axes.push(dsv.gradient()?);
    }

    let [x, y, z]: [Vec<f64>; 3] = axes.try_into().map_err(|_| Error::Dsv {
        path: path.as_ref().to_owned(),
        reason: "expected three gradient axes".to_owned(),
    })?;
    if x.len() != y.len() || y.len() != z.len() {
        return Err(Error::Dsv {
            path: path.as_ref().to_owned(),
            reason: format!(
                "gradient axes differ in length: {}, {}, {}",
                x.len(),
                y.len(),
                z.len()
            ),
        });
    }
    log::debug!("loaded {} gradient samples from DSV", x.len());
    Ok(AxisSeries { x, y, z })
}
