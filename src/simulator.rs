//! The run pipeline: plan, replay, derive or convolve, resample.

use std::path::Path;
use std::time::{Duration, Instant};

use num_complex::Complex;

use crate::buffer::{Filled, Storage};
use crate::calculus::{self, KSPACE_SCALE, SLEW_RATE_SCALE};
use crate::config::RunConfig;
use crate::document::{load_chain, DocumentSource, FileSource};
use crate::dsv;
use crate::eddy::{self, EddyCurrentModel};
use crate::error::{Error, Result};
use crate::interpreter::Interpreter;
use crate::phase::PhaseCorrector;
use crate::planner::Plan;
use crate::resample;
use crate::shapes::ShapeLibrary;
use crate::types::{AxisSeries, DataType, OutputMode, RunOutput, Series, Verbosity};

/// Runs sequences with one configuration. Keeps the interpolated eddy phase
/// of the last eddy phase run for [`Simulator::apply_phase_modulation`].
pub struct Simulator {
    config: RunConfig,
    corrector: Option<PhaseCorrector>,
}

impl Simulator {
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            corrector: None,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Simulate the document chain starting at `root`.
    pub fn run<S>(&mut self, source: &S, root: &str, storage: Storage) -> Result<RunOutput>
    where
        S: DocumentSource + ?Sized,
    {
        let start = Instant::now();
        let verbosity = self.config.verbosity;
        self.corrector = None;
        self.config.log_coefficients();

        let plan = Plan::scan(source, root)?;
        if verbosity.contains(Verbosity::BASIC) {
            log::info!(
                "{} documents, {} gradient ticks ({} s), {} RX samples in {} readouts, {} TX pulses, {} triggers",
                plan.documents,
                plan.gradient_ticks,
                plan.duration(),
                plan.rx_samples,
                plan.rx_events,
                plan.tx_events,
                plan.trigger_events,
            );
        }

        let shapes = ShapeLibrary::load(&load_chain(source, root)?)?;
        if verbosity.contains(Verbosity::ADVANCED) {
            log::info!("loaded {} gradient shapes", shapes.len());
        }

        let filled = Interpreter::new(&plan, &shapes, storage, verbosity).run(source, root, &plan)?;
        let output = self.process(filled)?;

        if verbosity.contains(Verbosity::BASIC) {
            log::info!("run took {}", format_duration(start.elapsed()));
        }
        Ok(output)
    }

    /// Simulate an instruction document on disk. Continuations are looked up
    /// next to it.
    pub fn run_file<P: AsRef<Path>>(&mut self, path: P, storage: Storage) -> Result<RunOutput> {
        let (source, root) = FileSource::for_file(path);
        self.run(&source, &root, storage)
    }

    /// Derive the configured data type from the dense gradients of the DSV
    /// files belonging to `path`. DSV files carry no readout timing, so only
    /// [`OutputMode::Full`] is supported.
    pub fn run_dsv<P: AsRef<Path>>(&mut self, path: P) -> Result<RunOutput> {
        let start = Instant::now();
        self.corrector = None;
        if self.config.output_mode != OutputMode::Full {
            return Err(Error::Dsv {
                path: path.as_ref().to_owned(),
                reason: "DSV gradients have no readout times to interpolate to".to_owned(),
            });
        }
        self.config.log_coefficients();

        let gradients = dsv::load_gradients(path)?;
        let output = self.process(Filled {
            gradients,
            rx_times: Vec::new(),
            rx_event_length: Vec::new(),
            tx_center_times: Vec::new(),
            trigger_times: Vec::new(),
        })?;

        if self.config.verbosity.contains(Verbosity::BASIC) {
            log::info!("run took {}", format_duration(start.elapsed()));
        }
        Ok(output)
    }

    fn process(&mut self, filled: Filled) -> Result<RunOutput> {
        let Filled {
            gradients,
            mut rx_times,
            rx_event_length,
            tx_center_times,
            trigger_times,
        } = filled;
        let RunConfig {
            data_type,
            output_mode,
            ..
        } = self.config;

        let series = self.derive(gradients, &tx_center_times)?;
        let series = match output_mode {
            OutputMode::Full => series,
            OutputMode::InterpolatedToRx => {
                let series = interpolate_series(&series, &rx_times)?;
                if tx_center_times.len() > 1 {
                    resample::rebase(&mut rx_times, &tx_center_times);
                }
                series
            }
        };

        if let (DataType::EddyPhase, OutputMode::InterpolatedToRx, Series::Single(phase)) =
            (data_type, output_mode, &series)
        {
            self.corrector = Some(PhaseCorrector::new(phase.clone(), rx_event_length.clone()));
        }

        Ok(RunOutput {
            data_type,
            output_mode,
            series,
            rx_times,
            rx_event_length,
            tx_center_times,
            trigger_times,
        })
    }

    /// Turn the dense gradients into the configured data type, on the raster.
    fn derive(&self, mut gradients: AxisSeries, tx_center_times: &[f64]) -> Result<Series> {
        Ok(match self.config.data_type {
            DataType::Gradient => Series::Axes(gradients),
            DataType::Kspace => {
                for axis in gradients.axes_mut() {
                    calculus::integral(axis, KSPACE_SCALE, Some(tx_center_times));
                }
                Series::Axes(gradients)
            }
            DataType::SlewRate => Series::Axes(slew_rate(gradients)),
            DataType::EddyCurrent => Series::Axes(self.eddy_currents(gradients)?),
            DataType::EddyPhase => Series::Single(eddy::eddy_phase(&self.eddy_currents(gradients)?)),
        })
    }

    fn eddy_currents(&self, gradients: AxisSeries) -> Result<AxisSeries> {
        let slew = slew_rate(gradients);
        let model = EddyCurrentModel::new(
            &self.config.decay,
            slew.len(),
            self.config.ecc_scale,
            self.config.verbosity,
        );
        model.eddy_currents(&slew)
    }

    pub fn phase_corrector(&self) -> Option<&PhaseCorrector> {
        self.corrector.as_ref()
    }

    /// Remove the eddy phase from the samples of readout `scan`. Needs a
    /// preceding eddy phase run with interpolated output.
    pub fn apply_phase_modulation(
        &self,
        samples: &mut [Complex<f32>],
        sample_count: usize,
        scan: usize,
    ) -> Result<()> {
        self.corrector
            .as_ref()
            .ok_or(Error::PhaseCorrectionUnavailable)?
            .apply(samples, sample_count, scan)
    }
}

fn slew_rate(mut gradients: AxisSeries) -> AxisSeries {
    for axis in gradients.axes_mut() {
        calculus::derivative(axis, SLEW_RATE_SCALE);
    }
    gradients
}

fn interpolate_series(series: &Series, times: &[f64]) -> Result<Series> {
    Ok(match series {
        Series::Axes(axes) => Series::Axes(AxisSeries {
            x: resample::interpolate(&axes.x, times)?,
            y: resample::interpolate(&axes.y, times)?,
            z: resample::interpolate(&axes.z, times)?,
        }),
        Series::Single(values) => Series::Single(resample::interpolate(values, times)?),
    })
}

/// `"H h M min S s"`, with fractional seconds.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs_f64();
    let hours = (total / 3600.0).floor();
    let minutes = ((total - hours * 3600.0) / 60.0).floor();
    let seconds = total - hours * 3600.0 - minutes * 60.0;
    format!("{hours} h {minutes} min {seconds:.3} s")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::MemorySource;
    use assert2::{check, let_assert};

    fn source() -> MemorySource {
        MemorySource::new().with(
            "seq",
            r#"<DspInstructions><EventBlock>
                <RX><Readout NumberOfPoints="4" DwellTime="10" EvalInfoMask="0"/></RX>
                <GC><Control Ticks="8">
                    <Axis Log="A" Gradient="PE"><Increment Value="1" Offset="0"/></Axis>
                    <Trigger Kind="RX" Delay="10"/>
                </Control></GC>
            </EventBlock></DspInstructions>"#,
        )
    }

    #[test]
    fn duration_format() {
        check!(format_duration(Duration::from_millis(3_723_500)) == "1 h 2 min 3.500 s");
        check!(format_duration(Duration::ZERO) == "0 h 0 min 0.000 s");
    }

    #[test]
    fn gradient_full_and_interpolated() {
        let mut sim = Simulator::new(RunConfig::new(DataType::Gradient, OutputMode::Full));
        let out = sim.run(&source(), "seq", Storage::SelfOwned).unwrap();
        let_assert!(Series::Axes(axes) = &out.series);
        check!(axes.x == vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);

        let mut sim = Simulator::new(RunConfig::new(DataType::Gradient, OutputMode::InterpolatedToRx));
        let out = sim.run(&source(), "seq", Storage::SelfOwned).unwrap();
        // samples at 10, 20, 30, 40 µs are raster indices 0 to 3
        let_assert!(Series::Axes(axes) = &out.series);
        check!(axes.x == vec![0.0, 1.0, 2.0, 3.0]);
        check!(sim.phase_corrector().is_none());
    }

    #[test]
    fn slew_rate_of_ramp() {
        let mut sim = Simulator::new(RunConfig::new(DataType::SlewRate, OutputMode::Full));
        let out = sim.run(&source(), "seq", Storage::SelfOwned).unwrap();
        let_assert!(Series::Axes(axes) = out.series);
        // 1 mT/m per 10 µs is 100 T/m/s
        for &v in &axes.x[..7] {
            check!((v - 100.0).abs() < 1e-9);
        }
        check!(axes.x[7] == 0.0);
    }

    #[test]
    fn phase_modulation_needs_eddy_phase_run() {
        let sim = Simulator::new(RunConfig::default());
        let mut data = vec![Complex::new(1.0f32, 0.0); 4];
        let_assert!(Err(Error::PhaseCorrectionUnavailable) = sim.apply_phase_modulation(&mut data, 4, 0));
    }

    #[test]
    fn dsv_only_supports_full_output() {
        let mut sim = Simulator::new(RunConfig::new(DataType::Gradient, OutputMode::InterpolatedToRx));
        let_assert!(Err(Error::Dsv { .. }) = sim.run_dsv("missing.xml"));
    }
}
