//! Per-scope measurement values.
//!
//! A `SensorValues` record carries the hit count plus CPU time, CPU energy
//! and RAM energy, each split into self/aggregated/intern/extern/lang-internal
//! variants. Time is integer microseconds, energy is milli-joules.
//!
//! The binary form is sparse: a 2-byte bitmask over the 16 fields in their
//! declared order, followed by the value of every non-zero field. Most
//! records in a profile have only a handful of non-zero buckets, and profiles
//! can contain tens of thousands of records, so this is where the format's
//! compactness comes from.

use serde::{Deserialize, Serialize};

use crate::codec::{BufferReader, BufferWriter};
use crate::utils::error::{CodecError, ValidationError};

/// Integer microseconds of CPU time
pub type MicroSeconds = u64;

/// Milli-joules of consumed energy
pub type MilliJoule = f64;

fn is_zero_uint(value: &u64) -> bool {
    *value == 0
}

fn is_zero_energy(value: &f64) -> bool {
    *value == 0.0
}

/// Measurement record attached to every source node and reference.
///
/// All fields are structurally present in memory; zero fields are omitted
/// from the JSON projection and from the sparse binary encoding.
///
/// Invariant: every field is >= 0 and energy fields are finite.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SensorValues {
    /// Number of times the profiler sampled this scope
    #[serde(skip_serializing_if = "is_zero_uint")]
    pub profiler_hits: u64,

    /// CPU time spent directly in this scope
    #[serde(skip_serializing_if = "is_zero_uint")]
    pub self_cpu_time: MicroSeconds,

    /// Self time plus everything attributed to reachable callees
    #[serde(skip_serializing_if = "is_zero_uint")]
    pub aggregated_cpu_time: MicroSeconds,

    /// CPU time that flowed into same-codebase callees
    #[serde(skip_serializing_if = "is_zero_uint")]
    pub intern_cpu_time: MicroSeconds,

    /// CPU time that flowed into third-party modules
    #[serde(skip_serializing_if = "is_zero_uint")]
    pub extern_cpu_time: MicroSeconds,

    /// CPU time that flowed into language/runtime internals
    #[serde(skip_serializing_if = "is_zero_uint")]
    pub lang_internal_cpu_time: MicroSeconds,

    #[serde(skip_serializing_if = "is_zero_energy")]
    pub self_cpu_energy_consumption: MilliJoule,

    #[serde(skip_serializing_if = "is_zero_energy")]
    pub aggregated_cpu_energy_consumption: MilliJoule,

    #[serde(skip_serializing_if = "is_zero_energy")]
    pub intern_cpu_energy_consumption: MilliJoule,

    #[serde(skip_serializing_if = "is_zero_energy")]
    pub extern_cpu_energy_consumption: MilliJoule,

    #[serde(skip_serializing_if = "is_zero_energy")]
    pub lang_internal_cpu_energy_consumption: MilliJoule,

    #[serde(skip_serializing_if = "is_zero_energy")]
    pub self_ram_energy_consumption: MilliJoule,

    #[serde(skip_serializing_if = "is_zero_energy")]
    pub aggregated_ram_energy_consumption: MilliJoule,

    #[serde(skip_serializing_if = "is_zero_energy")]
    pub intern_ram_energy_consumption: MilliJoule,

    #[serde(skip_serializing_if = "is_zero_energy")]
    pub extern_ram_energy_consumption: MilliJoule,

    #[serde(skip_serializing_if = "is_zero_energy")]
    pub lang_internal_ram_energy_consumption: MilliJoule,
}

impl SensorValues {
    /// A record with every field zero
    pub fn zero() -> Self {
        Self::default()
    }

    /// True if every field is zero
    pub fn is_zero(&self) -> bool {
        self.uint_fields().iter().all(|(_, v)| *v == 0)
            && self.energy_fields().iter().all(|v| *v == 0.0)
    }

    /// Field-wise addition
    pub fn add(&mut self, other: &Self) {
        self.profiler_hits += other.profiler_hits;
        self.self_cpu_time += other.self_cpu_time;
        self.aggregated_cpu_time += other.aggregated_cpu_time;
        self.intern_cpu_time += other.intern_cpu_time;
        self.extern_cpu_time += other.extern_cpu_time;
        self.lang_internal_cpu_time += other.lang_internal_cpu_time;
        self.self_cpu_energy_consumption += other.self_cpu_energy_consumption;
        self.aggregated_cpu_energy_consumption += other.aggregated_cpu_energy_consumption;
        self.intern_cpu_energy_consumption += other.intern_cpu_energy_consumption;
        self.extern_cpu_energy_consumption += other.extern_cpu_energy_consumption;
        self.lang_internal_cpu_energy_consumption += other.lang_internal_cpu_energy_consumption;
        self.self_ram_energy_consumption += other.self_ram_energy_consumption;
        self.aggregated_ram_energy_consumption += other.aggregated_ram_energy_consumption;
        self.intern_ram_energy_consumption += other.intern_ram_energy_consumption;
        self.extern_ram_energy_consumption += other.extern_ram_energy_consumption;
        self.lang_internal_ram_energy_consumption += other.lang_internal_ram_energy_consumption;
    }

    /// Field-wise sum over a sequence.
    ///
    /// Commutative and associative: reordering or regrouping the sequence
    /// yields the same result (up to float summation order for energy).
    pub fn sum<'a>(values: impl IntoIterator<Item = &'a Self>) -> Self {
        let mut total = Self::zero();
        for value in values {
            total.add(value);
        }
        total
    }

    /// Field-wise maximum over a sequence
    pub fn max<'a>(values: impl IntoIterator<Item = &'a Self>) -> Self {
        let mut result = Self::zero();
        for other in values {
            result.profiler_hits = result.profiler_hits.max(other.profiler_hits);
            result.self_cpu_time = result.self_cpu_time.max(other.self_cpu_time);
            result.aggregated_cpu_time = result.aggregated_cpu_time.max(other.aggregated_cpu_time);
            result.intern_cpu_time = result.intern_cpu_time.max(other.intern_cpu_time);
            result.extern_cpu_time = result.extern_cpu_time.max(other.extern_cpu_time);
            result.lang_internal_cpu_time =
                result.lang_internal_cpu_time.max(other.lang_internal_cpu_time);
            result.self_cpu_energy_consumption = result
                .self_cpu_energy_consumption
                .max(other.self_cpu_energy_consumption);
            result.aggregated_cpu_energy_consumption = result
                .aggregated_cpu_energy_consumption
                .max(other.aggregated_cpu_energy_consumption);
            result.intern_cpu_energy_consumption = result
                .intern_cpu_energy_consumption
                .max(other.intern_cpu_energy_consumption);
            result.extern_cpu_energy_consumption = result
                .extern_cpu_energy_consumption
                .max(other.extern_cpu_energy_consumption);
            result.lang_internal_cpu_energy_consumption = result
                .lang_internal_cpu_energy_consumption
                .max(other.lang_internal_cpu_energy_consumption);
            result.self_ram_energy_consumption = result
                .self_ram_energy_consumption
                .max(other.self_ram_energy_consumption);
            result.aggregated_ram_energy_consumption = result
                .aggregated_ram_energy_consumption
                .max(other.aggregated_ram_energy_consumption);
            result.intern_ram_energy_consumption = result
                .intern_ram_energy_consumption
                .max(other.intern_ram_energy_consumption);
            result.extern_ram_energy_consumption = result
                .extern_ram_energy_consumption
                .max(other.extern_ram_energy_consumption);
            result.lang_internal_ram_energy_consumption = result
                .lang_internal_ram_energy_consumption
                .max(other.lang_internal_ram_energy_consumption);
        }
        result
    }

    /// Record a measured sample: the delta's hits and self components are
    /// added to this record's self fields and mirrored into the aggregated
    /// fields (aggregated = self + callee flow, and callee flow arrives
    /// separately through references).
    pub fn add_own_sample(&mut self, delta: &Self) {
        self.profiler_hits += delta.profiler_hits;
        self.self_cpu_time += delta.self_cpu_time;
        self.aggregated_cpu_time += delta.self_cpu_time;
        self.self_cpu_energy_consumption += delta.self_cpu_energy_consumption;
        self.aggregated_cpu_energy_consumption += delta.self_cpu_energy_consumption;
        self.self_ram_energy_consumption += delta.self_ram_energy_consumption;
        self.aggregated_ram_energy_consumption += delta.self_ram_energy_consumption;
    }

    /// Roll a callee delta into the intern bucket and the aggregated totals
    pub fn add_intern_call(&mut self, delta: &Self) {
        self.intern_cpu_time += delta.self_cpu_time;
        self.aggregated_cpu_time += delta.self_cpu_time;
        self.intern_cpu_energy_consumption += delta.self_cpu_energy_consumption;
        self.aggregated_cpu_energy_consumption += delta.self_cpu_energy_consumption;
        self.intern_ram_energy_consumption += delta.self_ram_energy_consumption;
        self.aggregated_ram_energy_consumption += delta.self_ram_energy_consumption;
    }

    /// Roll a callee delta into the extern bucket and the aggregated totals
    pub fn add_extern_call(&mut self, delta: &Self) {
        self.extern_cpu_time += delta.self_cpu_time;
        self.aggregated_cpu_time += delta.self_cpu_time;
        self.extern_cpu_energy_consumption += delta.self_cpu_energy_consumption;
        self.aggregated_cpu_energy_consumption += delta.self_cpu_energy_consumption;
        self.extern_ram_energy_consumption += delta.self_ram_energy_consumption;
        self.aggregated_ram_energy_consumption += delta.self_ram_energy_consumption;
    }

    /// Roll a callee delta into the lang-internal bucket and the aggregated totals
    pub fn add_lang_internal_call(&mut self, delta: &Self) {
        self.lang_internal_cpu_time += delta.self_cpu_time;
        self.aggregated_cpu_time += delta.self_cpu_time;
        self.lang_internal_cpu_energy_consumption += delta.self_cpu_energy_consumption;
        self.aggregated_cpu_energy_consumption += delta.self_cpu_energy_consumption;
        self.lang_internal_ram_energy_consumption += delta.self_ram_energy_consumption;
        self.aggregated_ram_energy_consumption += delta.self_ram_energy_consumption;
    }

    /// Deduct a reference's aggregated contribution from this record's
    /// aggregated fields. Used when collapsing a file's records into one
    /// total: an in-file reference's flow is already counted by its target
    /// node's own record.
    pub fn subtract_aggregated_of(&mut self, reference: &Self) {
        self.aggregated_cpu_time = self
            .aggregated_cpu_time
            .saturating_sub(reference.aggregated_cpu_time);
        self.aggregated_cpu_energy_consumption -= reference.aggregated_cpu_energy_consumption;
        self.aggregated_ram_energy_consumption -= reference.aggregated_ram_energy_consumption;
    }

    /// Check the field invariant: integers are unsigned by construction,
    /// energy must be non-negative and finite
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in self.named_energy_fields() {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(ValidationError::InvalidSensorValue { field, value });
            }
        }
        Ok(())
    }

    /// The six unsigned fields in declared order, bits 0-5 of the mask
    fn uint_fields(&self) -> [(&'static str, u64); 6] {
        [
            ("profiler hits", self.profiler_hits),
            ("self cpu time", self.self_cpu_time),
            ("aggregated cpu time", self.aggregated_cpu_time),
            ("intern cpu time", self.intern_cpu_time),
            ("extern cpu time", self.extern_cpu_time),
            ("lang internal cpu time", self.lang_internal_cpu_time),
        ]
    }

    /// The ten energy fields in declared order, bits 6-15 of the mask
    fn energy_fields(&self) -> [f64; 10] {
        [
            self.self_cpu_energy_consumption,
            self.aggregated_cpu_energy_consumption,
            self.intern_cpu_energy_consumption,
            self.extern_cpu_energy_consumption,
            self.lang_internal_cpu_energy_consumption,
            self.self_ram_energy_consumption,
            self.aggregated_ram_energy_consumption,
            self.intern_ram_energy_consumption,
            self.extern_ram_energy_consumption,
            self.lang_internal_ram_energy_consumption,
        ]
    }

    fn named_energy_fields(&self) -> [(&'static str, f64); 10] {
        [
            ("selfCPUEnergyConsumption", self.self_cpu_energy_consumption),
            (
                "aggregatedCPUEnergyConsumption",
                self.aggregated_cpu_energy_consumption,
            ),
            ("internCPUEnergyConsumption", self.intern_cpu_energy_consumption),
            ("externCPUEnergyConsumption", self.extern_cpu_energy_consumption),
            (
                "langInternalCPUEnergyConsumption",
                self.lang_internal_cpu_energy_consumption,
            ),
            ("selfRAMEnergyConsumption", self.self_ram_energy_consumption),
            (
                "aggregatedRAMEnergyConsumption",
                self.aggregated_ram_energy_consumption,
            ),
            ("internRAMEnergyConsumption", self.intern_ram_energy_consumption),
            ("externRAMEnergyConsumption", self.extern_ram_energy_consumption),
            (
                "langInternalRAMEnergyConsumption",
                self.lang_internal_ram_energy_consumption,
            ),
        ]
    }

    /// Encode as bitmask + non-zero fields.
    ///
    /// An all-zero record encodes as exactly two bytes (`0x0000`).
    pub fn to_buffer(&self, writer: &mut BufferWriter) -> Result<(), CodecError> {
        let uints = self.uint_fields();
        let energies = self.energy_fields();

        let mut mask = 0u16;
        for (bit, (_, value)) in uints.iter().enumerate() {
            if *value != 0 {
                mask |= 1 << bit;
            }
        }
        for (offset, value) in energies.iter().enumerate() {
            if *value != 0.0 {
                mask |= 1 << (6 + offset);
            }
        }

        writer.write_u16(mask);
        for (bit, (field, value)) in uints.iter().enumerate() {
            if mask & (1 << bit) != 0 {
                writer.write_uint(field, *value)?;
            }
        }
        for (offset, value) in energies.iter().enumerate() {
            if mask & (1 << (6 + offset)) != 0 {
                writer.write_f64(*value);
            }
        }

        Ok(())
    }

    /// Decode a record encoded by [`Self::to_buffer`]
    pub fn from_buffer(reader: &mut BufferReader<'_>) -> Result<Self, CodecError> {
        let mask = reader.read_u16("sensor values mask")?;

        let mut values = Self::zero();
        {
            let uint_slots: [&mut u64; 6] = [
                &mut values.profiler_hits,
                &mut values.self_cpu_time,
                &mut values.aggregated_cpu_time,
                &mut values.intern_cpu_time,
                &mut values.extern_cpu_time,
                &mut values.lang_internal_cpu_time,
            ];
            for (bit, slot) in uint_slots.into_iter().enumerate() {
                if mask & (1 << bit) != 0 {
                    *slot = reader.read_uint("sensor uint field")?;
                }
            }
        }
        {
            let energy_slots: [&mut f64; 10] = [
                &mut values.self_cpu_energy_consumption,
                &mut values.aggregated_cpu_energy_consumption,
                &mut values.intern_cpu_energy_consumption,
                &mut values.extern_cpu_energy_consumption,
                &mut values.lang_internal_cpu_energy_consumption,
                &mut values.self_ram_energy_consumption,
                &mut values.aggregated_ram_energy_consumption,
                &mut values.intern_ram_energy_consumption,
                &mut values.extern_ram_energy_consumption,
                &mut values.lang_internal_ram_energy_consumption,
            ];
            for (offset, slot) in energy_slots.into_iter().enumerate() {
                if mask & (1 << (6 + offset)) != 0 {
                    *slot = reader.read_f64("sensor energy field")?;
                }
            }
        }

        Ok(values)
    }
}
