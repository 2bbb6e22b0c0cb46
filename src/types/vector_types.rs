use super::{DataType, OutputMode};

/// One dense or interpolated series per physical gradient axis.
#[derive(Default, Debug, Clone)]
pub struct AxisSeries {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
}

impl AxisSeries {
    pub fn zeros(len: usize) -> Self {
        Self {
            x: vec![0.0; len],
            y: vec![0.0; len],
            z: vec![0.0; len],
        }
    }

    pub fn len(&self) -> usize {
        let len1 = self.x.len();
        let len2 = self.y.len();
        let len3 = self.z.len();
        assert!(len1 == len2 && len2 == len3);
        len1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn axes(&self) -> [&[f64]; 3] {
        [&self.x, &self.y, &self.z]
    }

    pub fn axes_mut(&mut self) -> [&mut Vec<f64>; 3] {
        [&mut self.x, &mut self.y, &mut self.z]
    }

    /// Sample-wise sum over the three axes.
    pub fn sum(&self) -> Vec<f64> {
        self.x
            .iter()
            .zip(&self.y)
            .zip(&self.z)
            .map(|((x, y), z)| x + y + z)
            .collect()
    }
}

/// The product of a run: three axis series, or a single series for the
/// eddy phase.
#[derive(Debug, Clone)]
pub enum Series {
    Axes(AxisSeries),
    Single(Vec<f64>),
}

impl Series {
    pub fn len(&self) -> usize {
        match self {
            Series::Axes(axes) => axes.len(),
            Series::Single(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn channels(&self) -> Vec<&[f64]> {
        match self {
            Series::Axes(axes) => axes.axes().to_vec(),
            Series::Single(values) => vec![values.as_slice()],
        }
    }

    pub(crate) fn into_vecs(self) -> Vec<Vec<f64>> {
        match self {
            Series::Axes(axes) => vec![axes.x, axes.y, axes.z],
            Series::Single(values) => vec![values],
        }
    }
}

/// Everything a run hands to the caller. All times are in seconds.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub data_type: DataType,
    pub output_mode: OutputMode,
    pub series: Series,
    /// Absolute time of every valid readout sample, or relative to the
    /// preceding transmit center if the output was rebased.
    pub rx_times: Vec<f64>,
    /// Cumulative sample count after each valid readout event
    pub rx_event_length: Vec<u32>,
    pub tx_center_times: Vec<f64>,
    pub trigger_times: Vec<f64>,
}

impl RunOutput {
    /// Number of samples in readout event `scan`.
    pub fn readout_len(&self, scan: usize) -> Option<usize> {
        let end = *self.rx_event_length.get(scan)? as usize;
        let start = match scan {
            0 => 0,
            _ => self.rx_event_length[scan - 1] as usize,
        };
        end.checked_sub(start)
    }

    /// Time of the first sample of readout event `scan`, `None` for a
    /// readout without samples.
    pub fn readout_start_time(&self, scan: usize) -> Option<f64> {
        if self.readout_len(scan)? == 0 {
            return None;
        }
        let start = match scan {
            0 => 0,
            _ => self.rx_event_length[scan - 1] as usize,
        };
        self.rx_times.get(start).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::check;

    fn output(lengths: Vec<u32>) -> RunOutput {
        let total = lengths.last().copied().unwrap_or(0) as usize;
        RunOutput {
            data_type: DataType::Gradient,
            output_mode: OutputMode::Full,
            series: Series::Single(Vec::new()),
            rx_times: (0..total).map(|i| i as f64).collect(),
            rx_event_length: lengths,
            tx_center_times: Vec::new(),
            trigger_times: Vec::new(),
        }
    }

    #[test]
    fn readout_boundaries() {
        let out = output(vec![4, 10, 12]);
        check!(out.readout_len(0) == Some(4));
        check!(out.readout_len(1) == Some(6));
        check!(out.readout_len(2) == Some(2));
        check!(out.readout_len(3) == None);
        check!(out.readout_start_time(1) == Some(4.0));
        check!(out.readout_start_time(3) == None);
    }

    #[test]
    fn empty_readout_has_no_start() {
        let out = output(vec![0, 4, 4, 6]);
        check!(out.readout_len(0) == Some(0));
        check!(out.readout_start_time(0) == None);
        check!(out.readout_start_time(1) == Some(0.0));
        check!(out.readout_len(2) == Some(0));
        check!(out.readout_start_time(2) == None);
        check!(out.readout_start_time(3) == Some(4.0));
    }

    #[test]
    fn axis_sum() {
        let axes = AxisSeries {
            x: vec![1.0, 2.0],
            y: vec![0.5, 0.0],
            z: vec![-1.0, 1.0],
        };
        check!(axes.sum() == vec![0.5, 3.0]);
        check!(axes.len() == 2);
    }
}
