//! Buffers sized once from a [`Plan`] and never grown afterwards. Every
//! write is bounds checked: running past the planned size means the
//! planner and the interpreter disagree, which is reported as an error.

use crate::error::{Error, Result};
use crate::planner::Plan;
use crate::types::{AxisSeries, RunOutput};

/// Where the memory of a run comes from.
#[derive(Debug, Default)]
pub enum Storage {
    /// Allocate fresh buffers
    #[default]
    SelfOwned,
    /// Reuse the buffers of a previous run. They are cleared and sized to
    /// the new plan, their contents are never read.
    Provided(RunOutput),
}

/// Fixed length buffer written through bounds checked windows.
#[derive(Debug)]
pub struct DenseBuffer {
    name: &'static str,
    data: Vec<f64>,
}

impl DenseBuffer {
    fn new(name: &'static str, mut data: Vec<f64>, len: usize) -> Self {
        data.clear();
        data.resize(len, 0.0);
        Self { name, data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn window_mut(&mut self, start: usize, len: usize) -> Result<&mut [f64]> {
        let (buffer, capacity) = (self.name, self.data.len());
        let exceeded = |requested| Error::CapacityExceeded {
            buffer,
            capacity,
            requested,
        };
        let end = start.checked_add(len).ok_or_else(|| exceeded(usize::MAX))?;
        if end > capacity {
            return Err(exceeded(end));
        }
        Ok(&mut self.data[start..end])
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }
}

/// Append-only buffer with a fixed capacity that must be filled exactly.
#[derive(Debug)]
pub struct AppendBuffer<T> {
    name: &'static str,
    data: Vec<T>,
    capacity: usize,
}

impl<T> AppendBuffer<T> {
    fn new(name: &'static str, mut data: Vec<T>, capacity: usize) -> Self {
        data.clear();
        data.reserve_exact(capacity);
        Self {
            name,
            data,
            capacity,
        }
    }

    pub fn push(&mut self, value: T) -> Result<()> {
        if self.data.len() >= self.capacity {
            return Err(Error::CapacityExceeded {
                buffer: self.name,
                capacity: self.capacity,
                requested: self.data.len() + 1,
            });
        }
        self.data.push(value);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the values if the buffer was filled to exactly its capacity.
    pub fn finish(self) -> Result<Vec<T>> {
        if self.data.len() != self.capacity {
            return Err(Error::CountMismatch {
                what: self.name,
                planned: self.capacity,
                written: self.data.len(),
            });
        }
        Ok(self.data)
    }
}

/// All buffers the interpreter writes into.
#[derive(Debug)]
pub struct Allocation {
    pub gx: DenseBuffer,
    pub gy: DenseBuffer,
    pub gz: DenseBuffer,
    pub rx_times: AppendBuffer<f64>,
    pub rx_event_length: AppendBuffer<u32>,
    pub tx_center_times: AppendBuffer<f64>,
    pub trigger_times: AppendBuffer<f64>,
}

/// The filled buffers, checked against the plan.
#[derive(Debug)]
pub struct Filled {
    pub gradients: AxisSeries,
    pub rx_times: Vec<f64>,
    pub rx_event_length: Vec<u32>,
    pub tx_center_times: Vec<f64>,
    pub trigger_times: Vec<f64>,
}

impl Allocation {
    pub fn new(plan: &Plan, storage: Storage) -> Self {
        let (mut series, rx_times, rx_event_length, tx_center_times, trigger_times) =
            match storage {
                Storage::SelfOwned => Default::default(),
                Storage::Provided(out) => (
                    out.series.into_vecs(),
                    out.rx_times,
                    out.rx_event_length,
                    out.tx_center_times,
                    out.trigger_times,
                ),
            };
        let mut spare = || series.pop().unwrap_or_default();

        Self {
            gx: DenseBuffer::new("GX", spare(), plan.gradient_ticks),
            gy: DenseBuffer::new("GY", spare(), plan.gradient_ticks),
            gz: DenseBuffer::new("GZ", spare(), plan.gradient_ticks),
            rx_times: AppendBuffer::new("RX samples", rx_times, plan.rx_samples),
            rx_event_length: AppendBuffer::new("RX events", rx_event_length, plan.rx_events),
            tx_center_times: AppendBuffer::new("TX events", tx_center_times, plan.tx_events),
            trigger_times: AppendBuffer::new("trigger events", trigger_times, plan.trigger_events),
        }
    }

    pub fn finish(self) -> Result<Filled> {
        Ok(Filled {
            gradients: AxisSeries {
                x: self.gx.into_vec(),
                y: self.gy.into_vec(),
                z: self.gz.into_vec(),
            },
            rx_times: self.rx_times.finish()?,
            rx_event_length: self.rx_event_length.finish()?,
            tx_center_times: self.tx_center_times.finish()?,
            trigger_times: self.trigger_times.finish()?,
        })
    }
}
