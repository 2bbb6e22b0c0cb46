//! Second pass over the instruction stream: replays every event block into
//! the buffers allocated from the [`Plan`].

use std::collections::VecDeque;

use crate::buffer::{Allocation, Filled, Storage};
use crate::document::{walk_chain, DocumentSource, Flow};
use crate::error::{Error, Result};
use crate::instruction::{
    EventBlock, Instruction, ReadoutEvent, TransmitEvent, TriggerKind, Waveform,
};
use crate::planner::Plan;
use crate::rotation::RotationState;
use crate::shapes::ShapeLibrary;
use crate::types::{GradientAxis, LogicalAxis, Verbosity, RASTER_TIME, RASTER_TIME_US};

/// Waveforms of both logical axes assigned inside one `Control`. Unassigned
/// directions stay at zero.
#[derive(Debug, Clone, Copy, Default)]
struct AxisSet {
    a: [Waveform; 3],
    b: [Waveform; 3],
}

impl AxisSet {
    fn set(&mut self, log: LogicalAxis, gradient: GradientAxis, waveform: Waveform) {
        let axis = match log {
            LogicalAxis::A => &mut self.a,
            LogicalAxis::B => &mut self.b,
        };
        axis[gradient.index()] = waveform;
    }

    fn is_silent(&self) -> bool {
        self.a.iter().chain(&self.b).all(|w| *w == Waveform::default())
    }
}

/// A waveform with its shape looked up.
#[derive(Clone, Copy)]
enum Resolved<'a> {
    Ramp { value: f64, offset: f64 },
    Shape(&'a [f64]),
}

impl Resolved<'_> {
    fn at(&self, tick: usize) -> f64 {
        match *self {
            Resolved::Ramp { value, offset } => value * tick as f64 + offset,
            Resolved::Shape(values) => values[tick],
        }
    }
}

/// Readout and transmit events of the current block, consumed in order.
#[derive(Default)]
struct Queues {
    rx: VecDeque<ReadoutEvent>,
    tx: VecDeque<TransmitEvent>,
}

pub struct Interpreter<'a> {
    shapes: &'a ShapeLibrary,
    verbosity: Verbosity,
    rotation: RotationState,
    alloc: Allocation,
    /// Start of the current `Control` window, in raster ticks
    cursor: usize,
    rx_samples: usize,
    blocks: usize,
}

impl<'a> Interpreter<'a> {
    pub fn new(plan: &Plan, shapes: &'a ShapeLibrary, storage: Storage, verbosity: Verbosity) -> Self {
        Self {
            shapes,
            verbosity,
            rotation: RotationState::default(),
            alloc: Allocation::new(plan, storage),
            cursor: 0,
            rx_samples: 0,
            blocks: 0,
        }
    }

    /// Replay the chain starting at `root`. The stream must be the one the
    /// plan was made from.
    pub fn run<S>(mut self, source: &S, root: &str, plan: &Plan) -> Result<Filled>
    where
        S: DocumentSource + ?Sized,
    {
        walk_chain(source, root, |node| {
            let block = EventBlock::parse(node)?;
            self.execute_block(&block)
        })?;

        if self.cursor != plan.gradient_ticks {
            return Err(Error::CountMismatch {
                what: "gradient ticks",
                planned: plan.gradient_ticks,
                written: self.cursor,
            });
        }
        if self.verbosity.contains(Verbosity::BASIC) {
            log::info!(
                "replayed {} event blocks: {} ticks, {} RX samples in {} readouts, {} TX pulses, {} triggers",
                self.blocks,
                self.cursor,
                self.rx_samples,
                self.alloc.rx_event_length.len(),
                self.alloc.tx_center_times.len(),
                self.alloc.trigger_times.len(),
            );
        }
        self.alloc.finish()
    }

    fn execute_block(&mut self, block: &EventBlock) -> Result<Flow> {
        self.blocks += 1;
        let mut queues = Queues {
            rx: block.readouts.iter().copied().collect(),
            tx: block.transmits.iter().copied().collect(),
        };

        let mut flow = Flow::Continue;
        for instr in &block.instructions {
            match instr {
                Instruction::Halt => {
                    flow = Flow::Halt;
                    break;
                }
                Instruction::Control { ticks, children } => {
                    let mut axes = AxisSet::default();
                    for child in children {
                        self.step(child, &mut queues, &mut axes)?;
                    }
                    self.play(&axes, *ticks)?;
                    self.cursor += ticks;
                }
                Instruction::Rotation {
                    log,
                    gradient,
                    vector,
                } => self.rotate(*log, *gradient, *vector),
                Instruction::Sync { .. } | Instruction::Trigger { .. } | Instruction::Axis { .. } => {
                    return Err(Error::UnknownInstruction(format!("{instr:?} outside Control")))
                }
            }
        }

        if !queues.rx.is_empty() {
            return Err(Error::UndrainedEvents {
                kind: "RX",
                count: queues.rx.len(),
            });
        }
        if !queues.tx.is_empty() {
            return Err(Error::UndrainedEvents {
                kind: "TX",
                count: queues.tx.len(),
            });
        }
        Ok(flow)
    }

    fn step(&mut self, instr: &Instruction, queues: &mut Queues, axes: &mut AxisSet) -> Result<()> {
        match *instr {
            Instruction::Sync { external } => {
                if external {
                    let time = self.cursor as f64 * RASTER_TIME;
                    self.alloc.trigger_times.push(time)?;
                }
            }
            Instruction::Trigger { kind, delay } => self.trigger(kind, delay, queues)?,
            Instruction::Axis {
                log,
                gradient,
                waveform,
            } => {
                if self.verbosity.contains(Verbosity::INCR_OFFSET) {
                    log::info!("tick {}: axis {log:?}/{gradient:?} = {waveform:?}", self.cursor);
                }
                axes.set(log, gradient, waveform);
            }
            Instruction::Rotation {
                log,
                gradient,
                vector,
            } => self.rotate(log, gradient, vector),
            Instruction::Control { .. } => {
                return Err(Error::UnknownInstruction("Control inside Control".to_owned()))
            }
            Instruction::Halt => {
                return Err(Error::UnknownInstruction("Halt inside Control".to_owned()))
            }
        }
        Ok(())
    }

    fn rotate(&mut self, log: LogicalAxis, gradient: GradientAxis, vector: [f64; 3]) {
        self.rotation = self.rotation.rotated(log, gradient, vector);
        if self.verbosity.contains(Verbosity::ROTMAT) {
            log::info!(
                "tick {}: matrix {log:?}\n{}",
                self.cursor,
                self.rotation.matrix(log)
            );
        }
    }

    fn trigger(&mut self, kind: TriggerKind, delay: f64, queues: &mut Queues) -> Result<()> {
        let window_start = RASTER_TIME_US * self.cursor as f64;
        match kind {
            TriggerKind::Rx => {
                let rx = queues.rx.pop_front().ok_or(Error::EventQueueEmpty("RX"))?;
                if !rx.valid {
                    return Ok(());
                }
                for i in 0..rx.samples {
                    let time = window_start + delay + rx.dwell_time * i as f64;
                    self.alloc.rx_times.push(time * 1e-6)?;
                }
                self.rx_samples += rx.samples;
                let boundary = u32::try_from(self.rx_samples).map_err(|_| Error::CapacityExceeded {
                    buffer: "RX event length",
                    capacity: u32::MAX as usize,
                    requested: self.rx_samples,
                })?;
                self.alloc.rx_event_length.push(boundary)?;
            }
            TriggerKind::Tx => {
                let tx = queues.tx.pop_front().ok_or(Error::EventQueueEmpty("TX"))?;
                let center = window_start + tx.center_offset();
                self.alloc.tx_center_times.push(center * 1e-6)?;
            }
            TriggerKind::FreqPhase => {}
        }
        Ok(())
    }

    /// Accumulate both logical axes, rotated to the physical axes, into the
    /// window `[cursor, cursor + ticks)`.
    fn play(&mut self, axes: &AxisSet, ticks: usize) -> Result<()> {
        let Allocation { gx, gy, gz, .. } = &mut self.alloc;
        let gx = gx.window_mut(self.cursor, ticks)?;
        let gy = gy.window_mut(self.cursor, ticks)?;
        let gz = gz.window_mut(self.cursor, ticks)?;
        if axes.is_silent() {
            return Ok(());
        }

        let a = resolve(&axes.a, self.shapes, ticks)?;
        let b = resolve(&axes.b, self.shapes, ticks)?;
        for t in 0..ticks {
            let logical_a = [a[0].at(t), a[1].at(t), a[2].at(t)];
            let logical_b = [b[0].at(t), b[1].at(t), b[2].at(t)];
            let [x, y, z] = self.rotation.physical(logical_a, logical_b);
            gx[t] += x;
            gy[t] += y;
            gz[t] += z;
        }
        Ok(())
    }
}

fn resolve<'s>(waveforms: &[Waveform; 3], shapes: &'s ShapeLibrary, ticks: usize) -> Result<[Resolved<'s>; 3]> {
    let one = |waveform: Waveform| -> Result<Resolved<'s>> {
        match waveform {
            Waveform::Ramp { value, offset } => Ok(Resolved::Ramp { value, offset }),
            Waveform::Shape(id) => {
                let values = shapes.get(id)?;
                if values.len() < ticks {
                    return Err(Error::ShapeTooShort {
                        id,
                        len: values.len(),
                        ticks,
                    });
                }
                Ok(Resolved::Shape(values))
            }
        }
    };
    Ok([one(waveforms[0])?, one(waveforms[1])?, one(waveforms[2])?])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::MemorySource;
    use assert2::{check, let_assert};

    fn replay(blocks: &str, shapes: &ShapeLibrary) -> Result<Filled> {
        let source = MemorySource::new().with(
            "seq",
            &format!("<DspInstructions>{blocks}</DspInstructions>"),
        );
        let plan = Plan::scan(&source, "seq")?;
        Interpreter::new(&plan, shapes, Storage::SelfOwned, Verbosity::NONE).run(&source, "seq", &plan)
    }

    const READOUT: &str = r#"<RX><Readout NumberOfPoints="2" DwellTime="5" EvalInfoMask="0"/></RX>"#;

    #[test]
    fn ramp_on_phase_encode() {
        let filled = replay(
            &format!(
                r#"<EventBlock>{READOUT}<GC>
                    <Rotation Log="A" Gradient="PE"><Vector Rot0="1" Rot1="0" Rot2="0"/></Rotation>
                    <Control Ticks="5">
                        <Axis Log="A" Gradient="PE"><Increment Value="1" Offset="0"/></Axis>
                        <Trigger Kind="RX" Delay="0"/>
                    </Control>
                </GC></EventBlock>"#
            ),
            &ShapeLibrary::new(),
        )
        .unwrap();

        check!(filled.gradients.x == vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        check!(filled.gradients.y == vec![0.0; 5]);
        check!(filled.gradients.z == vec![0.0; 5]);
    }

    #[test]
    fn overlapping_axes_accumulate() {
        let mut shapes = ShapeLibrary::new();
        shapes.insert(1, vec![10.0, 20.0, 30.0, 40.0]);
        let filled = replay(
            &format!(
                r#"<EventBlock>{READOUT}<GC>
                    <Rotation Log="B" Gradient="RO"><Vector Rot0="0" Rot1="0" Rot2="2"/></Rotation>
                    <Control Ticks="3">
                        <Axis Log="A" Gradient="SL"><Increment Value="0" Offset="1"/></Axis>
                        <Axis Log="B" Gradient="RO"><Shape ID="1"/></Axis>
                        <Axis Log="A" Gradient="RO"><Increment Value="-1" Offset="5"/></Axis>
                    </Control>
                    <Control Ticks="2">
                        <Trigger Kind="RX" Delay="0"/>
                    </Control>
                </GC></EventBlock>"#
            ),
            &shapes,
        )
        .unwrap();

        check!(filled.gradients.x == vec![0.0; 5]);
        check!(filled.gradients.y == vec![5.0, 4.0, 3.0, 0.0, 0.0]);
        // slice of A plus the readout of B, which is rotated onto Z
        check!(filled.gradients.z == vec![21.0, 41.0, 61.0, 0.0, 0.0]);
    }

    #[test]
    fn event_timing() {
        let filled = replay(
            r#"<EventBlock>
                <RX>
                    <Readout NumberOfPoints="3" DwellTime="4" EvalInfoMask="0"/>
                    <Readout NumberOfPoints="5" DwellTime="4" EvalInfoMask="1"/>
                    <Readout NumberOfPoints="2" DwellTime="10" EvalInfoMask="0"/>
                </RX>
                <TX>
                    <RfShape Type="Excitation" Asymmetry="0.5"><Trigger Time="100" NumberOfSamples="50"/></RfShape>
                </TX>
                <GC>
                    <Control Ticks="10">
                        <Trigger Kind="TX" Delay="0"/>
                        <Sync Ext="1"/>
                        <Trigger Kind="FreqPhase"/>
                    </Control>
                    <Control Ticks="10">
                        <Trigger Kind="RX" Delay="20"/>
                        <Trigger Kind="RX" Delay="0"/>
                    </Control>
                    <Control Ticks="10">
                        <Sync Ext="1"/>
                        <Trigger Kind="RX" Delay="5"/>
                    </Control>
                </GC>
            </EventBlock>"#,
            &ShapeLibrary::new(),
        )
        .unwrap();

        let expected_rx = [120e-6, 124e-6, 128e-6, 205e-6, 215e-6];
        check!(filled.rx_times.len() == expected_rx.len());
        for (t, e) in filled.rx_times.iter().zip(expected_rx) {
            check!((t - e).abs() < 1e-15);
        }
        check!(filled.rx_event_length == vec![3, 5]);
        check!(filled.tx_center_times.len() == 1);
        check!((filled.tx_center_times[0] - 50e-6).abs() < 1e-15);
        check!(filled.trigger_times.len() == 2);
        check!((filled.trigger_times[1] - 200e-6).abs() < 1e-15);
        check!(filled.gradients.len() == 30);
    }

    #[test]
    fn rotation_persists_across_blocks() {
        let filled = replay(
            &format!(
                r#"<EventBlock><GC>
                    <Rotation Log="A" Gradient="PE"><Vector Rot0="0" Rot1="1" Rot2="0"/></Rotation>
                </GC></EventBlock>
                <EventBlock>{READOUT}<GC>
                    <Control Ticks="2">
                        <Axis Log="A" Gradient="PE"><Increment Value="0" Offset="3"/></Axis>
                        <Trigger Kind="RX" Delay="0"/>
                    </Control>
                </GC></EventBlock>"#
            ),
            &ShapeLibrary::new(),
        )
        .unwrap();
        check!(filled.gradients.x == vec![0.0, 0.0]);
        check!(filled.gradients.y == vec![3.0, 3.0]);
    }

    #[test]
    fn queue_discipline() {
        let_assert!(
            Err(Error::UndrainedEvents { kind: "RX", count: 1 }) = replay(
                &format!(r#"<EventBlock>{READOUT}<GC><Control Ticks="2"/></GC></EventBlock>"#),
                &ShapeLibrary::new(),
            )
        );
        let_assert!(
            Err(Error::EventQueueEmpty("TX")) = replay(
                &format!(
                    r#"<EventBlock>{READOUT}<GC><Control Ticks="2">
                        <Trigger Kind="RX" Delay="0"/><Trigger Kind="TX" Delay="0"/>
                    </Control></GC></EventBlock>"#
                ),
                &ShapeLibrary::new(),
            )
        );
    }

    #[test]
    fn shape_errors() {
        let block = format!(
            r#"<EventBlock>{READOUT}<GC><Control Ticks="4">
                <Axis Log="A" Gradient="RO"><Shape ID="9"/></Axis>
                <Trigger Kind="RX" Delay="0"/>
            </Control></GC></EventBlock>"#
        );
        let_assert!(Err(Error::UnknownShape(9)) = replay(&block, &ShapeLibrary::new()));

        let mut shapes = ShapeLibrary::new();
        shapes.insert(9, vec![1.0, 2.0]);
        let_assert!(Err(Error::ShapeTooShort { id: 9, len: 2, ticks: 4 }) = replay(&block, &shapes));
    }

    #[test]
    fn plan_mismatch_is_detected() {
        let source = MemorySource::new().with(
            "seq",
            &format!(
                r#"<DspInstructions><EventBlock>{READOUT}<GC><Control Ticks="6"><Trigger Kind="RX" Delay="0"/></Control></GC></EventBlock></DspInstructions>"#
            ),
        );
        let mut plan = Plan::scan(&source, "seq").unwrap();
        plan.gradient_ticks = 4;
        let_assert!(
            Err(Error::CapacityExceeded { buffer: "GX", .. }) =
                Interpreter::new(&plan, &ShapeLibrary::new(), Storage::SelfOwned, Verbosity::NONE)
                    .run(&source, "seq", &plan)
        );
    }
}
