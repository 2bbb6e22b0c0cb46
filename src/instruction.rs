//! The instruction set of an event block. Elements are parsed once into
//! closed enums, both passes over the stream dispatch on those.

use crate::document::Element;
use crate::error::{Error, Result};
use crate::types::{GradientAxis, LogicalAxis, TxType};

// Evaluation info mask bits of the measurement data header
pub const MDH_ACQEND: u64 = 1;
pub const MDH_RTFEEDBACK: u64 = 1 << 1;
pub const MDH_HPFEEDBACK: u64 = 1 << 2;
pub const MDH_SYNCDATA: u64 = 1 << 5;
pub const MDH_NOISEADJSCAN: u64 = 1 << 25;

/// Readouts carrying any of these bits are not imaging scans and are
/// skipped by the acquisition loop.
pub const NON_IMAGING_MASK: u64 =
    MDH_ACQEND | MDH_RTFEEDBACK | MDH_HPFEEDBACK | MDH_SYNCDATA | MDH_NOISEADJSCAN;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadoutEvent {
    pub samples: usize,
    /// Unit: `µs`
    pub dwell_time: f64,
    pub valid: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransmitEvent {
    pub samples: usize,
    /// Unit: `µs`
    pub dwell_time: f64,
    /// Position of the effective pulse center within the pulse, `0..=1`
    pub asymmetry: f64,
    pub kind: TxType,
}

impl TransmitEvent {
    /// Offset of the pulse center from the trigger. Unit: `µs`
    pub fn center_offset(&self) -> f64 {
        self.dwell_time * self.samples as f64 * self.asymmetry
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    Rx,
    Tx,
    FreqPhase,
}

/// Where the per-tick value of one gradient direction comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Waveform {
    /// `value * tick + offset`, unit: `mT / m`
    Ramp { value: f64, offset: f64 },
    Shape(u32),
}

impl Default for Waveform {
    fn default() -> Self {
        Waveform::Ramp {
            value: 0.0,
            offset: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Play the nested instructions over the next `ticks` raster ticks
    Control {
        ticks: usize,
        children: Vec<Instruction>,
    },
    Sync {
        external: bool,
    },
    Trigger {
        kind: TriggerKind,
        /// Unit: `µs`
        delay: f64,
    },
    Axis {
        log: LogicalAxis,
        gradient: GradientAxis,
        waveform: Waveform,
    },
    /// Replace the column `gradient` of the matrix of `log`
    Rotation {
        log: LogicalAxis,
        gradient: GradientAxis,
        vector: [f64; 3],
    },
    Halt,
}

impl Instruction {
    fn parse(node: &Element, nested: bool) -> Result<Self> {
        match node.tag.as_str() {
            "Control" if !nested => Ok(Instruction::Control {
                ticks: node.parse("Ticks")?,
                children: node
                    .children
                    .iter()
                    .map(|child| Instruction::parse(child, true))
                    .collect::<Result<_>>()?,
            }),
            "Sync" if nested => Ok(Instruction::Sync {
                external: node.parse::<u32>("Ext")? != 0,
            }),
            "Trigger" if nested => {
                let kind = match node.require("Kind")? {
                    "RX" => TriggerKind::Rx,
                    "TX" => TriggerKind::Tx,
                    "FreqPhase" => TriggerKind::FreqPhase,
                    other => return Err(Error::UnknownInstruction(format!("Trigger Kind={other}"))),
                };
                let delay = match kind {
                    TriggerKind::FreqPhase => node.parse_finite_or("Delay", 0.0)?,
                    _ => node.parse_finite("Delay")?,
                };
                Ok(Instruction::Trigger { kind, delay })
            }
            "Axis" if nested => {
                let waveform = match node.children.as_slice() {
                    [source] if source.tag == "Increment" => Waveform::Ramp {
                        value: source.parse_finite("Value")?,
                        offset: source.parse_finite_or("Offset", 0.0)?,
                    },
                    [source] if source.tag == "Shape" => Waveform::Shape(source.parse("ID")?),
                    [source] => return Err(Error::UnknownInstruction(source.tag.clone())),
                    _ => {
                        return Err(Error::MissingAttribute {
                            tag: node.tag.clone(),
                            attribute: "Increment|Shape",
                        })
                    }
                };
                Ok(Instruction::Axis {
                    log: parse_log(node)?,
                    gradient: parse_gradient(node)?,
                    waveform,
                })
            }
            "Rotation" => {
                let vector = node.require_child("Vector")?;
                Ok(Instruction::Rotation {
                    log: parse_log(node)?,
                    gradient: parse_gradient(node)?,
                    vector: [
                        vector.parse_finite("Rot0")?,
                        vector.parse_finite("Rot1")?,
                        vector.parse_finite("Rot2")?,
                    ],
                })
            }
            "Halt" if !nested => Ok(Instruction::Halt),
            other => Err(Error::UnknownInstruction(other.to_owned())),
        }
    }
}

fn parse_log(node: &Element) -> Result<LogicalAxis> {
    match node.require("Log")? {
        "A" => Ok(LogicalAxis::A),
        "B" => Ok(LogicalAxis::B),
        other => Err(Error::InvalidAttribute {
            tag: node.tag.clone(),
            attribute: "Log",
            value: other.to_owned(),
        }),
    }
}

fn parse_gradient(node: &Element) -> Result<GradientAxis> {
    match node.require("Gradient")? {
        "PE" => Ok(GradientAxis::PhaseEncode),
        "RO" => Ok(GradientAxis::Readout),
        "SL" => Ok(GradientAxis::Slice),
        other => Err(Error::InvalidAttribute {
            tag: node.tag.clone(),
            attribute: "Gradient",
            value: other.to_owned(),
        }),
    }
}

/// One timed segment of the sequence. The readout and transmit lists are
/// consumed in order by `RX` / `TX` triggers of the GC list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventBlock {
    pub readouts: Vec<ReadoutEvent>,
    pub transmits: Vec<TransmitEvent>,
    pub instructions: Vec<Instruction>,
}

impl EventBlock {
    pub fn parse(node: &Element) -> Result<Self> {
        let mut block = EventBlock::default();

        for list in &node.children {
            match list.tag.as_str() {
                "RX" => {
                    for readout in &list.children {
                        block.readouts.push(parse_readout(readout)?);
                    }
                }
                "TX" => {
                    for pulse in &list.children {
                        block.transmits.push(parse_transmit(pulse)?);
                    }
                }
                "GC" => {
                    for instr in &list.children {
                        block.instructions.push(Instruction::parse(instr, false)?);
                    }
                }
                other => return Err(Error::UnknownInstruction(other.to_owned())),
            }
        }

        Ok(block)
    }

    pub fn valid_readouts(&self) -> impl Iterator<Item = &ReadoutEvent> + '_ {
        self.readouts.iter().filter(|rx| rx.valid)
    }
}

fn parse_readout(node: &Element) -> Result<ReadoutEvent> {
    if node.tag != "Readout" {
        return Err(Error::UnknownInstruction(node.tag.clone()));
    }
    let mask: u64 = node.parse("EvalInfoMask")?;
    Ok(ReadoutEvent {
        samples: node.parse("NumberOfPoints")?,
        dwell_time: node.parse_finite("DwellTime")?,
        valid: mask & NON_IMAGING_MASK == 0,
    })
}

fn parse_transmit(node: &Element) -> Result<TransmitEvent> {
    if node.tag != "RfShape" {
        return Err(Error::UnknownInstruction(node.tag.clone()));
    }
    let kind = match node.attr("Type") {
        Some("Excitation") => TxType::Excitation,
        Some("Inversion") => TxType::Inversion,
        _ => TxType::Undefined,
    };
    let trigger = node.require_child("Trigger")?;
    let duration = trigger.parse_finite("Time")?;
    let samples: usize = trigger.parse("NumberOfSamples")?;
    let dwell_time = match samples {
        0 => 0.0,
        n => duration / n as f64,
    };

    Ok(TransmitEvent {
        samples,
        dwell_time,
        asymmetry: node.parse_finite("Asymmetry")?,
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::{check, let_assert};

    fn block(xml: &str) -> Result<EventBlock> {
        let doc = Element::parse_document("test", &format!("<DspInstructions>{xml}</DspInstructions>"))?;
        EventBlock::parse(&doc.children[0])
    }

    #[test]
    fn parse_full_block() {
        let block = block(
            r#"<EventBlock>
                <RX>
                    <Readout NumberOfPoints="128" DwellTime="2.5" EvalInfoMask="0"/>
                    <Readout NumberOfPoints="64" DwellTime="5" EvalInfoMask="33554432"/>
                </RX>
                <TX>
                    <RfShape Type="Excitation" Asymmetry="0.5">
                        <Trigger Time="2000" NumberOfSamples="400"/>
                    </RfShape>
                </TX>
                <GC>
                    <Control Ticks="10">
                        <Sync Ext="1"/>
                        <Trigger Kind="TX" Delay="0"/>
                        <Axis Log="B" Gradient="SL"><Shape ID="7"/></Axis>
                    </Control>
                    <Rotation Log="A" Gradient="RO"><Vector Rot0="0" Rot1="1" Rot2="0"/></Rotation>
                    <Halt/>
                </GC>
            </EventBlock>"#,
        )
        .unwrap();

        check!(block.readouts.len() == 2);
        check!(block.readouts[0].valid);
        check!(!block.readouts[1].valid);
        check!(block.valid_readouts().count() == 1);

        let tx = block.transmits[0];
        check!(tx.kind == TxType::Excitation);
        check!(tx.dwell_time == 5.0);
        check!(tx.center_offset() == 1000.0);

        check!(block.instructions.len() == 3);
        let_assert!(Instruction::Control { ticks: 10, children } = &block.instructions[0]);
        check!(children[0] == Instruction::Sync { external: true });
        check!(
            children[2]
                == Instruction::Axis {
                    log: LogicalAxis::B,
                    gradient: GradientAxis::Slice,
                    waveform: Waveform::Shape(7),
                }
        );
        check!(
            block.instructions[1]
                == Instruction::Rotation {
                    log: LogicalAxis::A,
                    gradient: GradientAxis::Readout,
                    vector: [0.0, 1.0, 0.0],
                }
        );
        check!(block.instructions[2] == Instruction::Halt);
    }

    #[test]
    fn acquisition_end_is_not_valid() {
        let block = block(
            r#"<EventBlock><RX><Readout NumberOfPoints="16" DwellTime="1" EvalInfoMask="1"/></RX></EventBlock>"#,
        )
        .unwrap();
        check!(!block.readouts[0].valid);
    }

    #[test]
    fn unknown_instructions() {
        let_assert!(Err(Error::UnknownInstruction(tag)) = block("<EventBlock><GC><Jump/></GC></EventBlock>"));
        check!(tag == "Jump");

        let_assert!(
            Err(Error::UnknownInstruction(_)) =
                block(r#"<EventBlock><GC><Control Ticks="1"><Trigger Kind="Bogus" Delay="0"/></Control></GC></EventBlock>"#)
        );

        // Control and Halt are only valid at the top level of the GC list
        let_assert!(
            Err(Error::UnknownInstruction(_)) =
                block(r#"<EventBlock><GC><Control Ticks="1"><Halt/></Control></GC></EventBlock>"#)
        );
    }

    #[test]
    fn events_outside_control_are_rejected() {
        let_assert!(
            Err(Error::UnknownInstruction(tag)) = block(
                r#"<EventBlock><GC>
                    <Axis Log="A" Gradient="PE"><Increment Value="0" Offset="7"/></Axis>
                    <Control Ticks="4"/>
                </GC></EventBlock>"#
            )
        );
        check!(tag == "Axis");

        let_assert!(Err(Error::UnknownInstruction(tag)) = block(r#"<EventBlock><GC><Sync Ext="1"/></GC></EventBlock>"#));
        check!(tag == "Sync");

        let_assert!(
            Err(Error::UnknownInstruction(tag)) = block(
                r#"<EventBlock><RX><Readout NumberOfPoints="1" DwellTime="1" EvalInfoMask="0"/></RX>
                <GC><Trigger Kind="RX" Delay="0"/><Control Ticks="1"/></GC></EventBlock>"#
            )
        );
        check!(tag == "Trigger");
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let_assert!(
            Err(Error::InvalidAttribute { attribute: "DwellTime", .. }) =
                block(r#"<EventBlock><RX><Readout NumberOfPoints="2" DwellTime="NaN" EvalInfoMask="0"/></RX></EventBlock>"#)
        );
        let_assert!(
            Err(Error::InvalidAttribute { attribute: "Delay", .. }) =
                block(r#"<EventBlock><GC><Control Ticks="1"><Trigger Kind="TX" Delay="inf"/></Control></GC></EventBlock>"#)
        );
        let_assert!(
            Err(Error::InvalidAttribute { attribute: "Offset", .. }) = block(
                r#"<EventBlock><GC><Control Ticks="1">
                    <Axis Log="A" Gradient="RO"><Increment Value="1" Offset="-inf"/></Axis>
                </Control></GC></EventBlock>"#
            )
        );
        let_assert!(
            Err(Error::InvalidAttribute { attribute: "Rot2", .. }) = block(
                r#"<EventBlock><GC><Rotation Log="B" Gradient="SL"><Vector Rot0="0" Rot1="0" Rot2="nan"/></Rotation></GC></EventBlock>"#
            )
        );
        let_assert!(
            Err(Error::InvalidAttribute { attribute: "Asymmetry", .. }) = block(
                r#"<EventBlock><TX><RfShape Type="Excitation" Asymmetry="NaN"><Trigger Time="20" NumberOfSamples="2"/></RfShape></TX></EventBlock>"#
            )
        );
    }

    #[test]
    fn missing_attributes() {
        let_assert!(
            Err(Error::MissingAttribute { attribute: "Ticks", .. }) =
                block("<EventBlock><GC><Control/></GC></EventBlock>")
        );
        let_assert!(
            Err(Error::MissingAttribute { attribute: "Delay", .. }) =
                block(r#"<EventBlock><GC><Control Ticks="1"><Trigger Kind="RX"/></Control></GC></EventBlock>"#)
        );
        let_assert!(
            Err(Error::MissingAttribute { attribute: "Increment|Shape", .. }) =
                block(r#"<EventBlock><GC><Control Ticks="1"><Axis Log="A" Gradient="PE"/></Control></GC></EventBlock>"#)
        );
        // FreqPhase triggers don't need a delay
        check!(
            block(r#"<EventBlock><GC><Control Ticks="1"><Trigger Kind="FreqPhase"/></Control></GC></EventBlock>"#)
                .is_ok()
        );
    }
}
