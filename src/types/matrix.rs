//! Matrix model (SlotMap-backed).
//!
//! [`Matrix`] is the root aggregate of a CAN communication matrix. Frames and ECUs live in
//! **SlotMap** arenas with stable keys ([`FrameKey`], [`EcuKey`]); public iteration follows
//! order vectors via [`Matrix::frames`] and [`Matrix::ecus`].
//!
//! Every entity is created through the builder-style mutation API (`add_*`, `rename_*`,
//! `delete_*`), which validates the model invariants eagerly and fails with a typed error:
//! - frame arbitration ids are unique;
//! - signal names are unique within a frame and every signal fits the frame payload;
//! - at most one multiplexor per frame, and multiplexed selectors fit its raw domain;
//! - every attribute value has a Define in the matching scope and satisfies it.
//!
//! Cross references (transmitters, receivers, signal group members) are stored by name,
//! so renames and deletes scrub them here.

use log::debug;
use slotmap::{SlotMap, new_key_type};
use std::collections::{BTreeMap, HashMap};

use crate::types::{
    attributes::{AttributeMap, AttributeValue, Define, DefineScope, ValueTable},
    ecu::Ecu,
    errors::{LookupError, Result, ValidationError},
    frame::{ArbitrationId, Frame, MAX_FRAME_SIZE, SignalGroup},
    signal::Signal,
};

// --- Stable keys (SlotMap) ---
new_key_type! { pub struct FrameKey; }
new_key_type! { pub struct EcuKey; }

/// Entity an attribute value is attached to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttributeTarget<'a> {
    Global,
    Ecu(&'a str),
    Frame(ArbitrationId),
    Signal(ArbitrationId, &'a str),
}

impl AttributeTarget<'_> {
    /// Define scope matching this target.
    pub fn scope(&self) -> DefineScope {
        match self {
            AttributeTarget::Global => DefineScope::Global,
            AttributeTarget::Ecu(_) => DefineScope::Ecu,
            AttributeTarget::Frame(_) => DefineScope::Frame,
            AttributeTarget::Signal(..) => DefineScope::Signal,
        }
    }
}

/// In-memory representation of a CAN communication matrix.
#[derive(Default, Clone, Debug)]
pub struct Matrix {
    // --- Main storage (stable-key maps) ---
    frames: SlotMap<FrameKey, Frame>,
    ecus: SlotMap<EcuKey, Ecu>,

    // --- Order "views" ---
    frames_order: Vec<FrameKey>,
    ecus_order: Vec<EcuKey>,

    // --- Defines, one dictionary per scope ---
    global_defines: BTreeMap<String, Define>,
    ecu_defines: BTreeMap<String, Define>,
    frame_defines: BTreeMap<String, Define>,
    signal_defines: BTreeMap<String, Define>,

    // --- Named value tables ---
    value_tables: BTreeMap<String, ValueTable>,

    // --- Global Attribute Entry ---
    attributes: AttributeMap,

    // --- Lookups ---
    frame_key_by_id: HashMap<ArbitrationId, FrameKey>,
    ecu_key_by_name: HashMap<String, EcuKey>,
}

impl Matrix {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------- Frames ------------
    /// Adds a frame together with its signals and signal groups.
    ///
    /// The whole frame is validated first: unique id, payload size, signal layout and
    /// multiplexing, group members, and the Defines of every attribute it carries.
    pub fn add_frame(&mut self, frame: Frame) -> Result<FrameKey> {
        if self.frame_key_by_id.contains_key(&frame.id) {
            return Err(ValidationError::DuplicateFrameId { id: frame.id }.into());
        }
        frame.validate()?;
        for group in &frame.signal_groups {
            if let Some(missing) = group.signals.iter().find(|m| frame.signal(m).is_none()) {
                return Err(LookupError::Signal {
                    frame: frame.id,
                    signal: missing.clone(),
                }
                .into());
            }
        }
        self.check_attributes(DefineScope::Frame, &frame.attributes)?;
        for sig in &frame.signals {
            self.check_attributes(DefineScope::Signal, &sig.attributes)?;
        }

        let id: ArbitrationId = frame.id;
        debug!(
            "Adding frame {} '{}' with {} signals",
            id,
            frame.name,
            frame.signals.len()
        );
        let key: FrameKey = self.frames.insert(frame);
        self.frames_order.push(key);
        self.frame_key_by_id.insert(id, key);
        Ok(key)
    }

    pub fn get_frame_key(&self, id: ArbitrationId) -> Option<FrameKey> {
        self.frame_key_by_id.get(&id).copied()
    }

    pub fn frame_by_key(&self, key: FrameKey) -> Option<&Frame> {
        self.frames.get(key)
    }

    /// Returns a `&Frame` given its arbitration id.
    pub fn frame(&self, id: ArbitrationId) -> Option<&Frame> {
        let key: FrameKey = self.get_frame_key(id)?;
        self.frame_by_key(key)
    }

    /// Returns the first `&Frame` (in iteration order) with the given name.
    pub fn frame_by_name(&self, name: &str) -> Option<&Frame> {
        self.frames().find(|f| f.name == name)
    }

    /// Iterate frames following the order vector (insertion order unless sorted).
    pub fn frames(&self) -> impl Iterator<Item = &Frame> + '_ {
        self.frames_order.iter().filter_map(|&k| self.frames.get(k))
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn frame_mut(&mut self, id: ArbitrationId) -> Result<&mut Frame, LookupError> {
        let key: FrameKey = self.get_frame_key(id).ok_or(LookupError::Frame(id))?;
        self.frames.get_mut(key).ok_or(LookupError::Frame(id))
    }

    pub fn rename_frame(&mut self, id: ArbitrationId, name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        let frame: &mut Frame = self.frame_mut(id)?;
        debug!("Renaming frame {} '{}' -> '{}'", id, frame.name, name);
        frame.name = name.to_string();
        Ok(())
    }

    /// Changes the payload size; every signal must still fit. Sizes above 8 mark the frame CAN FD.
    pub fn set_frame_size(&mut self, id: ArbitrationId, size: u8) -> Result<()> {
        if size > MAX_FRAME_SIZE {
            return Err(ValidationError::InvalidFrameSize { size }.into());
        }
        let frame: &mut Frame = self.frame_mut(id)?;
        if let Some(sig) = frame.signals.iter().find(|s| s.check_fits(size).is_err()) {
            return Err(ValidationError::SignalOutOfFrame {
                frame: id,
                signal: sig.name.clone(),
                start_bit: sig.start_bit,
                length: sig.length,
                size,
            }
            .into());
        }
        frame.size = size;
        if size > 8 {
            frame.fd = true;
        }
        Ok(())
    }

    pub fn set_frame_comment(&mut self, id: ArbitrationId, comment: &str) -> Result<()> {
        self.frame_mut(id)?.comment = comment.to_string();
        Ok(())
    }

    /// Adds `ecu` to the transmitters of frame `id`. No duplicates.
    pub fn add_transmitter(&mut self, id: ArbitrationId, ecu: &str) -> Result<()> {
        if ecu.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        self.frame_mut(id)?.add_transmitter(ecu);
        Ok(())
    }

    /// Deletes a frame together with its signals and signal groups.
    pub fn delete_frame(&mut self, id: ArbitrationId) -> Result<Frame> {
        let key: FrameKey = self
            .frame_key_by_id
            .remove(&id)
            .ok_or(LookupError::Frame(id))?;
        self.frames_order.retain(|&k| k != key);
        let frame: Frame = self.frames.remove(key).ok_or(LookupError::Frame(id))?;
        debug!("Deleted frame {} '{}'", id, frame.name);
        Ok(frame)
    }

    // -------------- Signals ------------
    /// Adds a signal to frame `id`, validating layout and multiplexing against the frame.
    pub fn add_signal(&mut self, id: ArbitrationId, signal: Signal) -> Result<()> {
        let frame: &Frame = self.frame(id).ok_or(LookupError::Frame(id))?;
        if frame.signal(&signal.name).is_some() {
            return Err(ValidationError::DuplicateSignalName {
                frame: id,
                signal: signal.name,
            }
            .into());
        }
        frame.validate_signal(&signal)?;
        self.check_attributes(DefineScope::Signal, &signal.attributes)?;

        debug!("Adding signal '{}' to frame {}", signal.name, id);
        self.frame_mut(id)?.signals.push(signal);
        Ok(())
    }

    /// Returns a `&Signal` given its frame id and name.
    pub fn signal(&self, id: ArbitrationId, name: &str) -> Option<&Signal> {
        self.frame(id)?.signal(name)
    }

    fn signal_mut(&mut self, id: ArbitrationId, name: &str) -> Result<&mut Signal, LookupError> {
        self.frame_mut(id)?
            .signal_mut(name)
            .ok_or_else(|| LookupError::Signal {
                frame: id,
                signal: name.to_string(),
            })
    }

    /// Renames a signal and every signal group reference to it.
    pub fn rename_signal(&mut self, id: ArbitrationId, old: &str, new: &str) -> Result<()> {
        if new.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        let frame: &mut Frame = self.frame_mut(id)?;
        if old != new && frame.signal(new).is_some() {
            return Err(ValidationError::DuplicateSignalName {
                frame: id,
                signal: new.to_string(),
            }
            .into());
        }
        let sig: &mut Signal = frame.signal_mut(old).ok_or_else(|| LookupError::Signal {
            frame: id,
            signal: old.to_string(),
        })?;
        sig.name = new.to_string();

        for group in &mut frame.signal_groups {
            for member in group.signals.iter_mut().filter(|m| m.as_str() == old) {
                *member = new.to_string();
            }
        }
        debug!("Renamed signal '{}' -> '{}' in frame {}", old, new, id);
        Ok(())
    }

    pub fn set_signal_comment(&mut self, id: ArbitrationId, name: &str, comment: &str) -> Result<()> {
        self.signal_mut(id, name)?.comment = comment.to_string();
        Ok(())
    }

    /// Replaces the value descriptions of a signal.
    pub fn set_signal_value_table(
        &mut self,
        id: ArbitrationId,
        name: &str,
        values: ValueTable,
    ) -> Result<()> {
        self.signal_mut(id, name)?.values = values;
        Ok(())
    }

    /// Adds `ecu` to the receivers of a signal. No duplicates.
    pub fn add_receiver(&mut self, id: ArbitrationId, signal: &str, ecu: &str) -> Result<()> {
        if ecu.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        self.signal_mut(id, signal)?.add_receiver(ecu);
        Ok(())
    }

    /// Deletes a signal and removes it from every signal group of the frame.
    pub fn delete_signal(&mut self, id: ArbitrationId, name: &str) -> Result<Signal> {
        let frame: &mut Frame = self.frame_mut(id)?;
        let pos: usize = frame
            .signals
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| LookupError::Signal {
                frame: id,
                signal: name.to_string(),
            })?;
        let sig: Signal = frame.signals.remove(pos);
        for group in &mut frame.signal_groups {
            group.signals.retain(|m| m != name);
        }
        debug!("Deleted signal '{}' from frame {}", name, id);
        Ok(sig)
    }

    // -------------- Signal groups ------------
    /// Adds a signal group; every member must name a signal of the frame.
    pub fn add_signal_group(&mut self, id: ArbitrationId, group: SignalGroup) -> Result<()> {
        if group.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        let frame: &mut Frame = self.frame_mut(id)?;
        if frame.signal_group(&group.name).is_some() {
            return Err(ValidationError::DuplicateSignalGroup {
                frame: id,
                group: group.name,
            }
            .into());
        }
        if let Some(missing) = group.signals.iter().find(|m| frame.signal(m).is_none()) {
            return Err(LookupError::Signal {
                frame: id,
                signal: missing.clone(),
            }
            .into());
        }
        debug!("Adding signal group '{}' to frame {}", group.name, id);
        frame.signal_groups.push(group);
        Ok(())
    }

    pub fn delete_signal_group(&mut self, id: ArbitrationId, name: &str) -> Result<SignalGroup> {
        let frame: &mut Frame = self.frame_mut(id)?;
        let pos: usize = frame
            .signal_groups
            .iter()
            .position(|g| g.name == name)
            .ok_or_else(|| LookupError::SignalGroup {
                frame: id,
                group: name.to_string(),
            })?;
        Ok(frame.signal_groups.remove(pos))
    }

    pub fn rename_signal_group(&mut self, id: ArbitrationId, old: &str, new: &str) -> Result<()> {
        if new.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        let frame: &mut Frame = self.frame_mut(id)?;
        if old != new && frame.signal_group(new).is_some() {
            return Err(ValidationError::DuplicateSignalGroup {
                frame: id,
                group: new.to_string(),
            }
            .into());
        }
        let group: &mut SignalGroup = frame
            .signal_groups
            .iter_mut()
            .find(|g| g.name == old)
            .ok_or_else(|| LookupError::SignalGroup {
                frame: id,
                group: old.to_string(),
            })?;
        group.name = new.to_string();
        debug!("Renamed signal group '{}' -> '{}' in frame {}", old, new, id);
        Ok(())
    }

    // --------- ECUs --------
    pub fn add_ecu(&mut self, ecu: Ecu) -> Result<EcuKey> {
        if ecu.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if self.ecu_key_by_name.contains_key(&ecu.name) {
            return Err(ValidationError::DuplicateEcu { name: ecu.name }.into());
        }
        self.check_attributes(DefineScope::Ecu, &ecu.attributes)?;

        debug!("Adding ECU '{}'", ecu.name);
        let name: String = ecu.name.clone();
        let key: EcuKey = self.ecus.insert(ecu);
        self.ecus_order.push(key);
        self.ecu_key_by_name.insert(name, key);
        Ok(key)
    }

    pub fn get_ecu_key(&self, name: &str) -> Option<EcuKey> {
        self.ecu_key_by_name.get(name).copied()
    }

    /// Returns a `&Ecu` given its name (case-sensitive).
    pub fn ecu(&self, name: &str) -> Option<&Ecu> {
        let key: EcuKey = self.get_ecu_key(name)?;
        self.ecus.get(key)
    }

    /// Iterate ECUs following the order vector (insertion order unless sorted).
    pub fn ecus(&self) -> impl Iterator<Item = &Ecu> + '_ {
        self.ecus_order.iter().filter_map(|&k| self.ecus.get(k))
    }

    pub fn ecu_count(&self) -> usize {
        self.ecus.len()
    }

    fn ecu_mut(&mut self, name: &str) -> Result<&mut Ecu, LookupError> {
        let key: EcuKey = self
            .get_ecu_key(name)
            .ok_or_else(|| LookupError::Ecu(name.to_string()))?;
        self.ecus
            .get_mut(key)
            .ok_or_else(|| LookupError::Ecu(name.to_string()))
    }

    pub fn set_ecu_comment(&mut self, name: &str, comment: &str) -> Result<()> {
        self.ecu_mut(name)?.comment = comment.to_string();
        Ok(())
    }

    /// Renames an ECU and every transmitter/receiver reference to it.
    pub fn rename_ecu(&mut self, old: &str, new: &str) -> Result<()> {
        if new.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if old != new && self.ecu_key_by_name.contains_key(new) {
            return Err(ValidationError::DuplicateEcu {
                name: new.to_string(),
            }
            .into());
        }
        let key: EcuKey = self
            .ecu_key_by_name
            .remove(old)
            .ok_or_else(|| LookupError::Ecu(old.to_string()))?;
        if let Some(ecu) = self.ecus.get_mut(key) {
            ecu.name = new.to_string();
        }
        self.ecu_key_by_name.insert(new.to_string(), key);

        for frame in self.frames.values_mut() {
            for tx in frame.transmitters.iter_mut().filter(|t| t.as_str() == old) {
                *tx = new.to_string();
            }
            for sig in &mut frame.signals {
                for rx in sig.receivers.iter_mut().filter(|r| r.as_str() == old) {
                    *rx = new.to_string();
                }
            }
        }
        debug!("Renamed ECU '{}' -> '{}'", old, new);
        Ok(())
    }

    /// Deletes an ECU and scrubs its name from transmitter and receiver sets.
    ///
    /// Frames and signals are left in place.
    pub fn delete_ecu(&mut self, name: &str) -> Result<Ecu> {
        let key: EcuKey = self
            .ecu_key_by_name
            .remove(name)
            .ok_or_else(|| LookupError::Ecu(name.to_string()))?;
        self.ecus_order.retain(|&k| k != key);
        let ecu: Ecu = self
            .ecus
            .remove(key)
            .ok_or_else(|| LookupError::Ecu(name.to_string()))?;

        for frame in self.frames.values_mut() {
            frame.transmitters.retain(|t| t != name);
            for sig in &mut frame.signals {
                sig.receivers.retain(|r| r != name);
            }
        }
        debug!("Deleted ECU '{}'", name);
        Ok(ecu)
    }

    // --------- Defines --------
    /// Define dictionary of one scope.
    pub fn defines(&self, scope: DefineScope) -> &BTreeMap<String, Define> {
        match scope {
            DefineScope::Global => &self.global_defines,
            DefineScope::Ecu => &self.ecu_defines,
            DefineScope::Frame => &self.frame_defines,
            DefineScope::Signal => &self.signal_defines,
        }
    }

    fn defines_mut(&mut self, scope: DefineScope) -> &mut BTreeMap<String, Define> {
        match scope {
            DefineScope::Global => &mut self.global_defines,
            DefineScope::Ecu => &mut self.ecu_defines,
            DefineScope::Frame => &mut self.frame_defines,
            DefineScope::Signal => &mut self.signal_defines,
        }
    }

    pub fn define(&self, scope: DefineScope, key: &str) -> Option<&Define> {
        self.defines(scope).get(key)
    }

    /// Declares an attribute in `scope`. The default, if any, must satisfy the declaration.
    pub fn add_define(&mut self, scope: DefineScope, key: &str, define: Define) -> Result<()> {
        if key.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if self.defines(scope).contains_key(key) {
            return Err(ValidationError::DuplicateDefine {
                scope,
                key: key.to_string(),
            }
            .into());
        }
        if let Some(default) = &define.default {
            define.validate(key, default)?;
        }
        debug!("Adding {} define '{}': {}", scope, key, define.definition());
        self.defines_mut(scope).insert(key.to_string(), define);
        Ok(())
    }

    /// Sets the default value of an existing Define.
    pub fn add_define_default(
        &mut self,
        scope: DefineScope,
        key: &str,
        value: AttributeValue,
    ) -> Result<()> {
        let define: &mut Define =
            self.defines_mut(scope)
                .get_mut(key)
                .ok_or_else(|| LookupError::Define {
                    scope,
                    key: key.to_string(),
                })?;
        define.validate(key, &value)?;
        define.default = Some(value);
        Ok(())
    }

    /// Renames a Define and the matching attribute key on every entity of its scope.
    pub fn rename_define(&mut self, scope: DefineScope, old: &str, new: &str) -> Result<()> {
        if new.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if old == new {
            return Ok(());
        }
        if self.defines(scope).contains_key(new) {
            return Err(ValidationError::DuplicateDefine {
                scope,
                key: new.to_string(),
            }
            .into());
        }
        let define: Define =
            self.defines_mut(scope)
                .remove(old)
                .ok_or_else(|| LookupError::Define {
                    scope,
                    key: old.to_string(),
                })?;
        self.defines_mut(scope).insert(new.to_string(), define);
        self.for_each_attribute_map_mut(scope, |attrs| {
            if let Some(value) = attrs.remove(old) {
                attrs.insert(new.to_string(), value);
            }
        });
        debug!("Renamed {} define '{}' -> '{}'", scope, old, new);
        Ok(())
    }

    /// Deletes a Define and every attribute value using it.
    pub fn delete_define(&mut self, scope: DefineScope, key: &str) -> Result<Define> {
        let define: Define =
            self.defines_mut(scope)
                .remove(key)
                .ok_or_else(|| LookupError::Define {
                    scope,
                    key: key.to_string(),
                })?;
        self.for_each_attribute_map_mut(scope, |attrs| {
            attrs.remove(key);
        });
        debug!("Deleted {} define '{}'", scope, key);
        Ok(define)
    }

    // --------- Value tables --------
    pub fn add_value_table(&mut self, name: &str, table: ValueTable) -> Result<()> {
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if self.value_tables.contains_key(name) {
            return Err(ValidationError::DuplicateValueTable {
                name: name.to_string(),
            }
            .into());
        }
        self.value_tables.insert(name.to_string(), table);
        Ok(())
    }

    pub fn value_table(&self, name: &str) -> Option<&ValueTable> {
        self.value_tables.get(name)
    }

    pub fn value_tables(&self) -> &BTreeMap<String, ValueTable> {
        &self.value_tables
    }

    pub fn delete_value_table(&mut self, name: &str) -> Result<ValueTable> {
        Ok(self
            .value_tables
            .remove(name)
            .ok_or_else(|| LookupError::ValueTable(name.to_string()))?)
    }

    pub fn rename_value_table(&mut self, old: &str, new: &str) -> Result<()> {
        if new.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if old != new && self.value_tables.contains_key(new) {
            return Err(ValidationError::DuplicateValueTable {
                name: new.to_string(),
            }
            .into());
        }
        let table: ValueTable = self
            .value_tables
            .remove(old)
            .ok_or_else(|| LookupError::ValueTable(old.to_string()))?;
        self.value_tables.insert(new.to_string(), table);
        debug!("Renamed value table '{}' -> '{}'", old, new);
        Ok(())
    }

    // --------- Attributes --------
    /// Global (matrix level) attribute values.
    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    /// Attribute map of `target`, if the target exists.
    pub fn attributes_of(&self, target: AttributeTarget<'_>) -> Option<&AttributeMap> {
        match target {
            AttributeTarget::Global => Some(&self.attributes),
            AttributeTarget::Ecu(name) => self.ecu(name).map(|e| &e.attributes),
            AttributeTarget::Frame(id) => self.frame(id).map(|f| &f.attributes),
            AttributeTarget::Signal(id, name) => self.signal(id, name).map(|s| &s.attributes),
        }
    }

    /// Explicit attribute value of `target`, falling back to the Define default.
    pub fn attribute_or_default(
        &self,
        target: AttributeTarget<'_>,
        key: &str,
    ) -> Option<&AttributeValue> {
        self.attributes_of(target)
            .and_then(|attrs| attrs.get(key))
            .or_else(|| self.define(target.scope(), key)?.default.as_ref())
    }

    /// Sets an attribute value; the key must be declared in the target's scope.
    pub fn add_attribute(
        &mut self,
        target: AttributeTarget<'_>,
        key: &str,
        value: AttributeValue,
    ) -> Result<()> {
        let scope: DefineScope = target.scope();
        let define: &Define = self.define(scope, key).ok_or_else(|| LookupError::Define {
            scope,
            key: key.to_string(),
        })?;
        define.validate(key, &value)?;
        self.attributes_mut(target)?.insert(key.to_string(), value);
        Ok(())
    }

    pub fn delete_attribute(
        &mut self,
        target: AttributeTarget<'_>,
        key: &str,
    ) -> Result<AttributeValue> {
        Ok(self
            .attributes_mut(target)?
            .remove(key)
            .ok_or_else(|| LookupError::Attribute(key.to_string()))?)
    }

    fn attributes_mut(&mut self, target: AttributeTarget<'_>) -> Result<&mut AttributeMap, LookupError> {
        match target {
            AttributeTarget::Global => Ok(&mut self.attributes),
            AttributeTarget::Ecu(name) => Ok(&mut self.ecu_mut(name)?.attributes),
            AttributeTarget::Frame(id) => Ok(&mut self.frame_mut(id)?.attributes),
            AttributeTarget::Signal(id, name) => Ok(&mut self.signal_mut(id, name)?.attributes),
        }
    }

    fn check_attributes(&self, scope: DefineScope, attrs: &AttributeMap) -> Result<()> {
        for (key, value) in attrs {
            let define: &Define = self.define(scope, key).ok_or_else(|| LookupError::Define {
                scope,
                key: key.clone(),
            })?;
            define.validate(key, value)?;
        }
        Ok(())
    }

    fn for_each_attribute_map_mut<F: FnMut(&mut AttributeMap)>(&mut self, scope: DefineScope, mut f: F) {
        match scope {
            DefineScope::Global => f(&mut self.attributes),
            DefineScope::Ecu => self.ecus.values_mut().for_each(|e| f(&mut e.attributes)),
            DefineScope::Frame => self.frames.values_mut().for_each(|fr| f(&mut fr.attributes)),
            DefineScope::Signal => {
                for frame in self.frames.values_mut() {
                    frame.signals.iter_mut().for_each(|s| f(&mut s.attributes));
                }
            }
        }
    }

    // -------------- Sorting ---------------
    /// Sort frames by arbitration id (standard ids first).
    pub fn sort_frames_by_id(&mut self) {
        self.frames_order
            .sort_by_key(|&k| self.frames.get(k).map(|f| (f.id.is_extended(), f.id.id())));
    }

    /// Sort ECUs by name, case insensitive.
    pub fn sort_ecus_by_name(&mut self) {
        self.ecus_order
            .sort_by_key(|&k| self.ecus.get(k).map(|e| e.name.to_ascii_lowercase()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::attributes::DefineKind;
    use crate::types::errors::MatrixError;
    use crate::types::signal::MuxRole;

    fn id(raw: u32) -> ArbitrationId {
        ArbitrationId::standard(raw).unwrap()
    }

    fn build_test_matrix() -> Matrix {
        let mut db = Matrix::new();
        db.add_define(
            DefineScope::Frame,
            "GenMsgCycleTime",
            Define::new(DefineKind::Int { min: 0, max: 10000 }).with_default(AttributeValue::Int(0)),
        )
        .unwrap();
        db.add_ecu(Ecu::new("Motor")).unwrap();
        db.add_ecu(Ecu::new("Gateway")).unwrap();
        db.add_frame(
            Frame::new(id(100), "Motor_01", 8)
                .with_transmitter("Motor")
                .with_attribute("GenMsgCycleTime", AttributeValue::Int(10))
                .with_signal(Signal::new("Speed", 0, 16).with_receiver("Gateway"))
                .with_signal(Signal::new("Status", 16, 4).with_receiver("Gateway"))
                .with_signal_group(SignalGroup::new("Grp", 1).with_signal("Speed").with_signal("Status")),
        )
        .unwrap();
        db.add_frame(Frame::new(id(200), "Game_01", 4).with_transmitter("Gateway"))
            .unwrap();
        db
    }

    #[test]
    fn test_add_frame_rejects_duplicate_id() {
        let mut db = build_test_matrix();
        let err = db.add_frame(Frame::new(id(100), "Other", 8)).unwrap_err();
        assert_eq!(
            err,
            MatrixError::Validation(ValidationError::DuplicateFrameId { id: id(100) })
        );
        assert_eq!(db.frame_count(), 2);
    }

    #[test]
    fn test_add_frame_requires_defines() {
        let mut db = Matrix::new();
        let frame = Frame::new(id(1), "F", 8).with_attribute("Unknown", AttributeValue::Int(1));
        assert!(matches!(
            db.add_frame(frame),
            Err(MatrixError::Lookup(LookupError::Define { .. }))
        ));
    }

    #[test]
    fn test_lookups_and_order() {
        let mut db = build_test_matrix();
        assert_eq!(db.frame(id(200)).map(|f| f.name.as_str()), Some("Game_01"));
        assert_eq!(db.frame_by_name("Motor_01").map(|f| f.id), Some(id(100)));
        assert!(db.signal(id(100), "Speed").is_some());

        let names: Vec<&str> = db.ecus().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Motor", "Gateway"]);
        db.sort_ecus_by_name();
        let names: Vec<&str> = db.ecus().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Gateway", "Motor"]);
    }

    #[test]
    fn test_add_signal_validates() {
        let mut db = build_test_matrix();
        assert!(db.add_signal(id(200), Signal::new("Fits", 24, 8)).is_ok());
        assert!(matches!(
            db.add_signal(id(200), Signal::new("Overflow", 28, 8)),
            Err(MatrixError::Validation(ValidationError::SignalOutOfFrame { .. }))
        ));
        assert!(matches!(
            db.add_signal(id(200), Signal::new("Fits", 0, 8)),
            Err(MatrixError::Validation(ValidationError::DuplicateSignalName { .. }))
        ));
        assert!(matches!(
            db.add_signal(id(999), Signal::new("X", 0, 8)),
            Err(MatrixError::Lookup(LookupError::Frame(_)))
        ));

        db.add_signal(id(200), Signal::new("Mux", 0, 2).with_mux(MuxRole::Multiplexor))
            .unwrap();
        assert!(matches!(
            db.add_signal(id(200), Signal::new("M2", 2, 2).with_mux(MuxRole::Multiplexor)),
            Err(MatrixError::Validation(ValidationError::DuplicateMultiplexor { .. }))
        ));
        assert!(matches!(
            db.add_signal(id(200), Signal::new("Sel", 8, 8).with_mux(MuxRole::Multiplexed(4))),
            Err(MatrixError::Validation(ValidationError::MuxSelectorOutOfRange { .. }))
        ));
    }

    #[test]
    fn test_delete_signal_updates_groups() {
        let mut db = build_test_matrix();
        let sig = db.delete_signal(id(100), "Speed").unwrap();
        assert_eq!(sig.name, "Speed");
        let group = db.frame(id(100)).unwrap().signal_group("Grp").unwrap();
        assert_eq!(group.signals, vec!["Status".to_string()]);
    }

    #[test]
    fn test_rename_signal_updates_groups() {
        let mut db = build_test_matrix();
        db.rename_signal(id(100), "Status", "State").unwrap();
        let frame = db.frame(id(100)).unwrap();
        assert!(frame.signal("State").is_some());
        assert_eq!(
            frame.signal_group("Grp").unwrap().signals,
            vec!["Speed".to_string(), "State".to_string()]
        );
        assert!(db.rename_signal(id(100), "State", "Speed").is_err());
    }

    #[test]
    fn test_rename_and_delete_ecu_scrub_references() {
        let mut db = build_test_matrix();
        db.rename_ecu("Gateway", "CGW").unwrap();
        assert!(db.ecu("Gateway").is_none());
        assert_eq!(db.frame(id(200)).unwrap().transmitters, vec!["CGW".to_string()]);
        assert_eq!(
            db.signal(id(100), "Speed").unwrap().receivers,
            vec!["CGW".to_string()]
        );

        db.delete_ecu("CGW").unwrap();
        assert_eq!(db.ecu_count(), 1);
        assert!(db.frame(id(200)).unwrap().transmitters.is_empty());
        assert!(db.signal(id(100), "Speed").unwrap().receivers.is_empty());
        // frames stay
        assert_eq!(db.frame_count(), 2);
    }

    #[test]
    fn test_delete_frame() {
        let mut db = build_test_matrix();
        let frame = db.delete_frame(id(100)).unwrap();
        assert_eq!(frame.signals.len(), 2);
        assert!(db.frame(id(100)).is_none());
        assert_eq!(db.frames().count(), 1);
        assert!(db.delete_frame(id(100)).is_err());
    }

    #[test]
    fn test_attributes_and_defaults() {
        let mut db = build_test_matrix();
        let target = AttributeTarget::Frame(id(200));
        assert_eq!(
            db.attribute_or_default(target, "GenMsgCycleTime"),
            Some(&AttributeValue::Int(0))
        );
        db.add_attribute(target, "GenMsgCycleTime", AttributeValue::Int(100))
            .unwrap();
        assert_eq!(
            db.attribute_or_default(target, "GenMsgCycleTime"),
            Some(&AttributeValue::Int(100))
        );
        assert!(db
            .add_attribute(target, "GenMsgCycleTime", AttributeValue::Int(20000))
            .is_err());
        assert!(db
            .add_attribute(AttributeTarget::Ecu("Motor"), "GenMsgCycleTime", AttributeValue::Int(1))
            .is_err());

        assert_eq!(
            db.delete_attribute(target, "GenMsgCycleTime").unwrap(),
            AttributeValue::Int(100)
        );
    }

    #[test]
    fn test_rename_and_delete_define() {
        let mut db = build_test_matrix();
        db.rename_define(DefineScope::Frame, "GenMsgCycleTime", "CycleTime")
            .unwrap();
        assert!(db.define(DefineScope::Frame, "GenMsgCycleTime").is_none());
        assert_eq!(
            db.frame(id(100)).unwrap().attributes.get("CycleTime"),
            Some(&AttributeValue::Int(10))
        );

        db.delete_define(DefineScope::Frame, "CycleTime").unwrap();
        assert!(db.frame(id(100)).unwrap().attributes.is_empty());
    }

    #[test]
    fn test_set_frame_size() {
        let mut db = build_test_matrix();
        assert!(db.set_frame_size(id(100), 2).is_err());
        assert!(db.set_frame_size(id(100), 3).is_ok());
        assert!(db.set_frame_size(id(100), 65).is_err());
        assert!(!db.frame(id(100)).unwrap().fd);
        db.set_frame_size(id(100), 12).unwrap();
        assert!(db.frame(id(100)).unwrap().fd);
        db.set_frame_size(id(100), 8).unwrap();
        assert!(db.frame(id(100)).unwrap().fd);
    }

    #[test]
    fn test_value_tables() {
        let mut db = Matrix::new();
        let table: ValueTable = [(0, "Off".to_string()), (1, "On".to_string())].into();
        db.add_value_table("OnOff", table.clone()).unwrap();
        assert!(db.add_value_table("OnOff", table).is_err());
        assert_eq!(db.value_table("OnOff").map(|t| t.len()), Some(2));
        db.delete_value_table("OnOff").unwrap();
        assert!(db.value_tables().is_empty());
    }

    #[test]
    fn test_signal_group_members_must_exist() {
        let mut db = build_test_matrix();
        let group = SignalGroup::new("Bad", 2).with_signal("Missing");
        assert!(matches!(
            db.add_signal_group(id(100), group),
            Err(MatrixError::Lookup(LookupError::Signal { .. }))
        ));
        assert!(db.delete_signal_group(id(100), "Grp").is_ok());
    }

    #[test]
    fn test_rename_signal_group() {
        let mut db = build_test_matrix();
        db.add_signal_group(id(100), SignalGroup::new("Other", 3).with_signal("Speed"))
            .unwrap();
        assert!(matches!(
            db.rename_signal_group(id(100), "Grp", " "),
            Err(MatrixError::Validation(ValidationError::EmptyName))
        ));
        assert!(matches!(
            db.rename_signal_group(id(100), "Grp", "Other"),
            Err(MatrixError::Validation(ValidationError::DuplicateSignalGroup { .. }))
        ));
        assert!(matches!(
            db.rename_signal_group(id(100), "Missing", "New"),
            Err(MatrixError::Lookup(LookupError::SignalGroup { .. }))
        ));
        db.rename_signal_group(id(100), "Grp", "Renamed").unwrap();
        let frame = db.frame(id(100)).unwrap();
        assert!(frame.signal_group("Grp").is_none());
        assert_eq!(frame.signal_group("Renamed").unwrap().signals, vec!["Speed", "Status"]);
    }

    #[test]
    fn test_rename_value_table() {
        let mut db = Matrix::new();
        let table: ValueTable = [(0, "Off".to_string()), (1, "On".to_string())].into();
        db.add_value_table("OnOff", table.clone()).unwrap();
        db.add_value_table("Gear", table).unwrap();
        assert!(matches!(
            db.rename_value_table("OnOff", ""),
            Err(MatrixError::Validation(ValidationError::EmptyName))
        ));
        assert!(matches!(
            db.rename_value_table("OnOff", "Gear"),
            Err(MatrixError::Validation(ValidationError::DuplicateValueTable { .. }))
        ));
        assert!(matches!(
            db.rename_value_table("Missing", "New"),
            Err(MatrixError::Lookup(LookupError::ValueTable(_)))
        ));
        db.rename_value_table("OnOff", "Switch").unwrap();
        assert!(db.value_table("OnOff").is_none());
        assert_eq!(db.value_table("Switch").map(|t| t.len()), Some(2));
    }
}
