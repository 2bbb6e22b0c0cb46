use crate::document::{walk_chain, DocumentSource, Flow};
use crate::error::{Error, Result};
use crate::instruction::{EventBlock, Instruction, TriggerKind};

/// Sizes of every buffer of a run, counted by a dry pass over the whole
/// document chain before anything is allocated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Plan {
    pub gradient_ticks: usize,
    /// Total number of samples of all valid readouts
    pub rx_samples: usize,
    /// Number of valid readouts
    pub rx_events: usize,
    pub tx_events: usize,
    /// Number of external sync triggers
    pub trigger_events: usize,
    pub documents: usize,
}

impl Plan {
    /// Count the whole chain starting at `root`.
    pub fn scan<S: DocumentSource + ?Sized>(source: &S, root: &str) -> Result<Self> {
        let mut plan = Plan::default();
        let documents = walk_chain(source, root, |node| {
            let block = EventBlock::parse(node)?;
            plan.add_block(&block)?;
            Ok(if block.instructions.contains(&Instruction::Halt) {
                Flow::Halt
            } else {
                Flow::Continue
            })
        })?;
        plan.documents = documents;

        if plan.gradient_ticks == 0 {
            return Err(Error::NoGradientTicks);
        }
        if plan.rx_events == 0 {
            return Err(Error::NoReadouts);
        }
        Ok(plan)
    }

    fn add_block(&mut self, block: &EventBlock) -> Result<()> {
        for rx in block.valid_readouts() {
            self.rx_events += 1;
            self.rx_samples = checked_count(self.rx_samples, rx.samples, "Readout", "NumberOfPoints")?;
        }
        for instr in &block.instructions {
            if *instr == Instruction::Halt {
                break;
            }
            self.add_instruction(instr)?;
        }
        Ok(())
    }

    fn add_instruction(&mut self, instr: &Instruction) -> Result<()> {
        match instr {
            Instruction::Control { ticks, children } => {
                self.gradient_ticks = checked_count(self.gradient_ticks, *ticks, "Control", "Ticks")?;
                for child in children {
                    self.add_instruction(child)?;
                }
            }
            Instruction::Sync { external: true } => self.trigger_events += 1,
            Instruction::Trigger {
                kind: TriggerKind::Tx,
                ..
            } => self.tx_events += 1,
            Instruction::Sync { external: false }
            | Instruction::Trigger { .. }
            | Instruction::Axis { .. }
            | Instruction::Rotation { .. }
            | Instruction::Halt => {}
        }
        Ok(())
    }

    /// Total duration of the gradient waveform. Unit: `s`
    pub fn duration(&self) -> f64 {
        self.gradient_ticks as f64 * crate::types::RASTER_TIME
    }
}

/// Largest sample count a single `f64` buffer can be allocated for.
const MAX_SAMPLES: usize = isize::MAX as usize / std::mem::size_of::<f64>();

/// `total + count`, or the attribute that made the total exceed what can be
/// allocated.
fn checked_count(total: usize, count: usize, tag: &str, attribute: &'static str) -> Result<usize> {
    total
        .checked_add(count)
        .filter(|&n| n <= MAX_SAMPLES)
        .ok_or_else(|| Error::InvalidAttribute {
            tag: tag.to_owned(),
            attribute,
            value: count.to_string(),
        })
}
