// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Memory allocation summary returned by code generation

use genn_model::types::type_size_bytes;
use genn_model::{ModelSpec, Population, Result, VarLocation, VarState};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bytes a generated model allocates, by memory space
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemAlloc {
    pub host_bytes: usize,
    pub device_bytes: usize,
    pub zero_copy_bytes: usize,
}

impl MemAlloc {
    /// Estimate allocation from population sizes, variable types and locations
    pub fn from_model(spec: &ModelSpec) -> Result<Self> {
        let mut mem = MemAlloc::default();
        let precision = spec.precision();

        let add_var = |mem: &mut MemAlloc, var: &VarState| -> Result<()> {
            let bytes = var.count * type_size_bytes(&var.type_name, precision)?;
            mem.add(var.location, bytes);
            Ok(())
        };

        for ng in spec.neuron_populations() {
            for var in ng.vars() {
                add_var(&mut mem, var)?;
            }
            // Spike count plus spike indices
            mem.add(VarLocation::HostDevice, 4 * (ng.num_neurons() + 1));
        }

        for sg in spec.synapse_populations() {
            for var in sg.vars() {
                add_var(&mut mem, var)?;
            }
            // Postsynaptic input accumulator
            mem.add(VarLocation::Device, precision.size_bytes() * sg.num_post());
            if sg.matrix_type().is_sparse() {
                // Row lengths and column indices
                mem.add(
                    VarLocation::HostDevice,
                    4 * sg.num_pre() + 4 * sg.num_pre() * sg.max_row_length(),
                );
            } else if sg.matrix_type().is_bitmask() {
                mem.add(
                    VarLocation::HostDevice,
                    (sg.num_pre() * sg.num_post()).div_ceil(32) * 4,
                );
            }
        }

        for cs in spec.current_sources() {
            for var in cs.vars() {
                add_var(&mut mem, var)?;
            }
        }

        for cu in spec.custom_updates() {
            for var in cu.vars() {
                add_var(&mut mem, var)?;
            }
        }

        Ok(mem)
    }

    fn add(&mut self, location: VarLocation, bytes: usize) {
        if location.is_zero_copy() {
            self.zero_copy_bytes += bytes;
            return;
        }
        if location.on_host() {
            self.host_bytes += bytes;
        }
        if location.on_device() {
            self.device_bytes += bytes;
        }
    }
}

impl fmt::Display for MemAlloc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Host: {:.3} MB, Device: {:.3} MB, Zero-copy: {:.3} MB",
            self.host_bytes as f64 / 1e6,
            self.device_bytes as f64 / 1e6,
            self.zero_copy_bytes as f64 / 1e6
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genn_model::Precision;

    #[test]
    fn test_locations_split_bytes() {
        let mut spec = ModelSpec::new("mem", Precision::Float);
        spec.add_neuron_population(
            "Pop",
            10,
            "Izhikevich",
            [("a", 0.02), ("b", 0.2), ("c", -65.0), ("d", 8.0)],
            [("V", -65.0), ("U", -13.0)],
        )
        .unwrap();
        let baseline = MemAlloc::from_model(&spec).unwrap();
        // Two float vars of 10 elements on host and device, plus spike buffers
        assert_eq!(baseline.host_bytes, 80 + 44);
        assert_eq!(baseline.device_bytes, 80 + 44);
        assert_eq!(baseline.zero_copy_bytes, 0);

        spec.set_var_location("Pop", "U", VarLocation::HostDeviceZeroCopy)
            .unwrap();
        let zero_copy = MemAlloc::from_model(&spec).unwrap();
        assert_eq!(zero_copy.zero_copy_bytes, 40);
        assert_eq!(zero_copy.device_bytes, 40 + 44);
    }
}
