//! Copy and merge of frames and ECUs between matrices.
//!
//! Frames, signals, ECUs, Defines and value tables are value-copied (`Clone`): the target
//! never shares structure with the source, so later mutations of one matrix do not show
//! up in the other.
//!
//! Every copy brings along the Define of each attribute key it carries, so the target
//! never holds an attribute value without a Define in the matching scope. When the target
//! already declares a key, its own Define is kept.

use log::{debug, warn};

use crate::types::{
    attributes::{AttributeMap, AttributeValue, Define, DefineScope},
    ecu::Ecu,
    errors::{LookupError, MatrixError, Result},
    frame::{ArbitrationId, Frame},
    matrix::{AttributeTarget, Matrix},
};

/// Result of a single [`copy_frame`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CopyOutcome {
    Copied,
    /// The target already had a frame with that arbitration id; nothing was touched.
    AlreadyPresent,
}

/// Summary of [`copy_ecu_with_frames`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CopyReport {
    pub ecu_copied: bool,
    pub frames_copied: Vec<ArbitrationId>,
    pub frames_already_present: Vec<ArbitrationId>,
}

/// Summary of [`Matrix::merge`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MergeReport {
    pub frames_merged: usize,
    pub ecus_merged: usize,
    pub defines_merged: usize,
    pub value_tables_merged: usize,
    /// Frames skipped because the target already used their arbitration id.
    pub collisions: Vec<ArbitrationId>,
    /// Frames that could not be copied, with the reason.
    pub failures: Vec<(ArbitrationId, MatrixError)>,
}

/// Copies frame `id` from `source` into `target`, together with the transmitter and
/// receiver ECUs `target` is missing and the Defines of every attribute it carries.
///
/// No-op when `target` already has a frame with that id. Everything is checked before
/// `target` is touched: on error `target` is left unchanged.
pub fn copy_frame(id: ArbitrationId, source: &Matrix, target: &mut Matrix) -> Result<CopyOutcome> {
    if target.frame(id).is_some() {
        return Ok(CopyOutcome::AlreadyPresent);
    }
    let frame: &Frame = source.frame(id).ok_or(LookupError::Frame(id))?;
    frame.validate()?;

    let mut plan: CopyPlan<'_> = CopyPlan::default();
    let receivers = frame.signals.iter().flat_map(|s| s.receivers.iter());
    for name in frame.transmitters.iter().chain(receivers) {
        if target.ecu(name).is_none()
            && let Some(ecu) = source.ecu(name)
        {
            plan.add_ecu(ecu, source, target)?;
        }
    }
    plan.check_attributes(DefineScope::Frame, &frame.attributes, source, target)?;
    for sig in &frame.signals {
        plan.check_attributes(DefineScope::Signal, &sig.attributes, source, target)?;
    }

    plan.apply(target)?;
    target.add_frame(frame.clone())?;
    debug!("Copied frame {} '{}'", id, frame.name);
    Ok(CopyOutcome::Copied)
}

/// Copies ECU `name`, every frame it transmits and every frame containing a signal it
/// receives, with the same ECU and Define closure as [`copy_frame`].
pub fn copy_ecu_with_frames(name: &str, source: &Matrix, target: &mut Matrix) -> Result<CopyReport> {
    let ecu: &Ecu = source
        .ecu(name)
        .ok_or_else(|| LookupError::Ecu(name.to_string()))?;
    let mut report: CopyReport = CopyReport::default();
    if target.ecu(name).is_none() {
        copy_ecu(ecu, source, target)?;
        report.ecu_copied = true;
    }

    let related = source.frames().filter(|f| {
        f.transmitters.iter().any(|t| t == name)
            || f.signals.iter().any(|s| s.receivers.iter().any(|r| r == name))
    });
    for frame in related {
        match copy_frame(frame.id, source, target)? {
            CopyOutcome::Copied => report.frames_copied.push(frame.id),
            CopyOutcome::AlreadyPresent => report.frames_already_present.push(frame.id),
        }
    }
    Ok(report)
}

fn copy_ecu(ecu: &Ecu, source: &Matrix, target: &mut Matrix) -> Result<()> {
    let mut plan: CopyPlan<'_> = CopyPlan::default();
    plan.add_ecu(ecu, source, target)?;
    plan.apply(target)
}

// ECUs and Defines a copy adds to the target, collected before the first mutation.
#[derive(Default)]
struct CopyPlan<'a> {
    ecus: Vec<&'a Ecu>,
    defines: Vec<(DefineScope, &'a str, &'a Define)>,
}

impl<'a> CopyPlan<'a> {
    fn add_ecu(&mut self, ecu: &'a Ecu, source: &'a Matrix, target: &Matrix) -> Result<()> {
        if self.ecus.iter().any(|e| e.name == ecu.name) {
            return Ok(());
        }
        self.check_attributes(DefineScope::Ecu, &ecu.attributes, source, target)?;
        self.ecus.push(ecu);
        Ok(())
    }

    // Validates every value against the Define `target` will hold for its key: the one
    // `target` already declares, else the one from `source`, which is then scheduled.
    fn check_attributes(
        &mut self,
        scope: DefineScope,
        attributes: &'a AttributeMap,
        source: &'a Matrix,
        target: &Matrix,
    ) -> Result<()> {
        for (key, value) in attributes {
            if let Some(existing) = target.define(scope, key) {
                existing.validate(key, value)?;
                continue;
            }
            let define: &'a Define = source.define(scope, key).ok_or_else(|| LookupError::Define {
                scope,
                key: key.clone(),
            })?;
            define.validate(key, value)?;
            if !self.defines.iter().any(|&(s, k, _)| s == scope && k == key.as_str()) {
                self.defines.push((scope, key.as_str(), define));
            }
        }
        Ok(())
    }

    fn apply(self, target: &mut Matrix) -> Result<()> {
        for (scope, key, define) in self.defines {
            target.add_define(scope, key, define.clone())?;
        }
        for ecu in self.ecus {
            target.add_ecu(ecu.clone())?;
            debug!("Copied ECU '{}'", ecu.name);
        }
        Ok(())
    }
}

impl Matrix {
    /// Unions Defines, value tables, global attributes, ECUs and frames of `sources` into
    /// `self`, in order.
    ///
    /// Entries already present in `self` win. A frame whose arbitration id is taken is
    /// recorded as a collision and skipped; a frame failing validation is recorded as a
    /// failure. Merging never aborts.
    pub fn merge(&mut self, sources: &[&Matrix]) -> MergeReport {
        let mut report: MergeReport = MergeReport::default();

        for source in sources {
            for scope in DefineScope::ALL {
                for (key, define) in source.defines(scope) {
                    match self.define(scope, key) {
                        Some(existing) if existing != define => warn!(
                            "Define '{}' ({}) differs between matrices, keeping {}",
                            key,
                            scope,
                            existing.definition()
                        ),
                        Some(_) => {}
                        None => match self.add_define(scope, key, define.clone()) {
                            Ok(()) => report.defines_merged += 1,
                            Err(e) => warn!("Skipping define '{}': {}", key, e),
                        },
                    }
                }
            }

            for (name, table) in source.value_tables() {
                match self.value_table(name) {
                    Some(existing) if existing != table => {
                        warn!("Value table '{}' differs between matrices, keeping the first", name)
                    }
                    Some(_) => {}
                    None => match self.add_value_table(name, table.clone()) {
                        Ok(()) => report.value_tables_merged += 1,
                        Err(e) => warn!("Skipping value table '{}': {}", name, e),
                    },
                }
            }

            for (key, value) in source.attributes() {
                if self.attributes().contains_key(key) {
                    continue;
                }
                let value: AttributeValue = value.clone();
                if let Err(e) = self.add_attribute(AttributeTarget::Global, key, value) {
                    warn!("Skipping global attribute '{}': {}", key, e);
                }
            }

            for ecu in source.ecus() {
                if self.ecu(&ecu.name).is_some() {
                    continue;
                }
                match copy_ecu(ecu, source, self) {
                    Ok(()) => report.ecus_merged += 1,
                    Err(e) => warn!("Skipping ECU '{}': {}", ecu.name, e),
                }
            }

            for frame in source.frames() {
                if self.frame(frame.id).is_some() {
                    warn!(
                        "Frame {} '{}' collides with an existing frame, skipped",
                        frame.id, frame.name
                    );
                    report.collisions.push(frame.id);
                    continue;
                }
                match copy_frame(frame.id, source, self) {
                    Ok(_) => report.frames_merged += 1,
                    Err(e) => {
                        warn!("Frame {} '{}' not merged: {}", frame.id, frame.name, e);
                        report.failures.push((frame.id, e));
                    }
                }
            }
        }
        debug!(
            "Merged {} frames, {} ECUs ({} collisions, {} failures)",
            report.frames_merged,
            report.ecus_merged,
            report.collisions.len(),
            report.failures.len()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::attributes::DefineKind;
    use crate::types::errors::ValidationError;
    use crate::types::signal::Signal;

    fn id(raw: u32) -> ArbitrationId {
        ArbitrationId::standard(raw).unwrap()
    }

    fn build_source() -> Matrix {
        let mut db = Matrix::new();
        db.add_define(
            DefineScope::Frame,
            "GenMsgCycleTime",
            Define::new(DefineKind::Int { min: 0, max: 1000 }).with_default(AttributeValue::Int(0)),
        )
        .unwrap();
        db.add_define(
            DefineScope::Signal,
            "GenSigStartValue",
            Define::new(DefineKind::Int { min: 0, max: 0 }),
        )
        .unwrap();
        db.add_define(DefineScope::Ecu, "NodeLayerModules", Define::new(DefineKind::String))
            .unwrap();
        db.add_define(DefineScope::Frame, "Unused", Define::new(DefineKind::String))
            .unwrap();
        db.add_ecu(Ecu::new("Motor").with_attribute("NodeLayerModules", AttributeValue::Str("CANnm".into())))
            .unwrap();
        db.add_ecu(Ecu::new("Gateway")).unwrap();
        db.add_ecu(Ecu::new("Dash")).unwrap();
        db.add_frame(
            Frame::new(id(100), "Motor_01", 8)
                .with_transmitter("Motor")
                .with_attribute("GenMsgCycleTime", AttributeValue::Int(10))
                .with_signal(
                    Signal::new("Speed", 0, 16)
                        .with_receiver("Gateway")
                        .with_attribute("GenSigStartValue", AttributeValue::Int(5)),
                ),
        )
        .unwrap();
        db.add_frame(
            Frame::new(id(200), "Dash_01", 8)
                .with_transmitter("Dash")
                .with_signal(Signal::new("Fuel", 0, 8).with_receiver("Motor")),
        )
        .unwrap();
        db
    }

    #[test]
    fn test_copy_frame_closure() {
        let source = build_source();
        let mut target = Matrix::new();
        assert_eq!(
            copy_frame(id(100), &source, &mut target).unwrap(),
            CopyOutcome::Copied
        );

        let frame = target.frame(id(100)).unwrap();
        for name in frame
            .transmitters
            .iter()
            .chain(frame.signals.iter().flat_map(|s| s.receivers.iter()))
        {
            assert!(target.ecu(name).is_some(), "missing ECU {name}");
        }
        assert!(target.ecu("Dash").is_none());
        assert!(target.define(DefineScope::Frame, "GenMsgCycleTime").is_some());
        assert!(target.define(DefineScope::Signal, "GenSigStartValue").is_some());
        assert!(target.define(DefineScope::Ecu, "NodeLayerModules").is_some());
        assert!(target.define(DefineScope::Frame, "Unused").is_none());
    }

    #[test]
    fn test_copy_frame_is_noop_when_present() {
        let source = build_source();
        let mut target = Matrix::new();
        target.add_frame(Frame::new(id(100), "Other", 2)).unwrap();
        assert_eq!(
            copy_frame(id(100), &source, &mut target).unwrap(),
            CopyOutcome::AlreadyPresent
        );
        assert_eq!(target.frame(id(100)).unwrap().name, "Other");
        assert_eq!(target.ecu_count(), 0);

        assert!(matches!(
            copy_frame(id(300), &source, &mut target),
            Err(MatrixError::Lookup(LookupError::Frame(_)))
        ));
    }

    #[test]
    fn test_copy_is_by_value() {
        let mut source = build_source();
        let mut target = Matrix::new();
        copy_frame(id(100), &source, &mut target).unwrap();
        source.rename_signal(id(100), "Speed", "VehSpeed").unwrap();
        assert!(target.signal(id(100), "Speed").is_some());
    }

    #[test]
    fn test_copy_ecu_with_frames() {
        let source = build_source();
        let mut target = Matrix::new();
        let report = copy_ecu_with_frames("Motor", &source, &mut target).unwrap();
        assert!(report.ecu_copied);
        // transmits 100, receives Fuel in 200
        assert_eq!(report.frames_copied, vec![id(100), id(200)]);
        assert!(target.ecu("Dash").is_some());

        let again = copy_ecu_with_frames("Motor", &source, &mut target).unwrap();
        assert!(!again.ecu_copied);
        assert_eq!(again.frames_already_present.len(), 2);
        assert!(copy_ecu_with_frames("Nobody", &source, &mut target).is_err());
    }

    #[test]
    fn test_merge_records_collisions() {
        let source = build_source();
        let mut target = Matrix::new();
        target.add_frame(Frame::new(id(200), "Taken", 8)).unwrap();

        let report = target.merge(&[&source]);
        assert_eq!(report.collisions, vec![id(200)]);
        assert_eq!(report.frames_merged, 1);
        assert_eq!(report.ecus_merged, 3);
        assert_eq!(report.defines_merged, 4);
        assert!(report.failures.is_empty());
        assert_eq!(target.frame(id(200)).unwrap().name, "Taken");
        assert_eq!(target.frame_count(), 2);
    }

    #[test]
    fn test_failed_copy_leaves_target_untouched() {
        let source = build_source();
        let mut target = Matrix::new();
        target
            .add_define(
                DefineScope::Frame,
                "GenMsgCycleTime",
                Define::new(DefineKind::Int { min: 0, max: 5 }),
            )
            .unwrap();

        assert!(matches!(
            copy_frame(id(100), &source, &mut target),
            Err(MatrixError::Validation(ValidationError::AttributeOutOfRange { .. }))
        ));
        assert_eq!(target.frame_count(), 0);
        assert_eq!(target.ecu_count(), 0);
        assert!(target.define(DefineScope::Signal, "GenSigStartValue").is_none());
        assert!(target.define(DefineScope::Ecu, "NodeLayerModules").is_none());
        assert!(copy_ecu_with_frames("Motor", &source, &mut target).is_err());
        assert_eq!(target.ecu_count(), 1);
        assert_eq!(target.frame_count(), 0);
    }

    #[test]
    fn test_merge_keeps_going_on_failure() {
        let source = build_source();
        let mut target = Matrix::new();
        // conflicting declaration: 10 is out of range here
        target
            .add_define(
                DefineScope::Frame,
                "GenMsgCycleTime",
                Define::new(DefineKind::Int { min: 0, max: 5 }),
            )
            .unwrap();

        let report = target.merge(&[&source]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, id(100));
        assert!(target.frame(id(200)).is_some());
        assert!(target.frame(id(100)).is_none());
    }
}
