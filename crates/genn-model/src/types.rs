// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Scalar precision, variable placement and matrix storage types

use crate::error::{GennError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Floating-point width used for `scalar` state variables or for simulation time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    #[default]
    Float,
    Double,
}

impl Precision {
    /// Size of one value in bytes
    pub fn size_bytes(self) -> usize {
        match self {
            Precision::Float => 4,
            Precision::Double => 8,
        }
    }

    /// C type name the code generator substitutes for `scalar`
    pub fn c_type(self) -> &'static str {
        match self {
            Precision::Float => "float",
            Precision::Double => "double",
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.c_type())
    }
}

impl FromStr for Precision {
    type Err = GennError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "float" => Ok(Precision::Float),
            "double" => Ok(Precision::Double),
            other => Err(GennError::configuration(format!(
                "Supported precisions are float and double, but '{}' was given",
                other
            ))),
        }
    }
}

/// Size in bytes of a variable type as written in a model description.
///
/// `scalar` resolves to the model precision.
pub fn type_size_bytes(type_name: &str, precision: Precision) -> Result<usize> {
    let size = match type_name.trim() {
        "scalar" => precision.size_bytes(),
        "float" => 4,
        "double" => 8,
        "int" | "unsigned int" | "int32_t" | "uint32_t" => 4,
        "short" | "unsigned short" | "int16_t" | "uint16_t" => 2,
        "char" | "unsigned char" | "int8_t" | "uint8_t" | "bool" => 1,
        "int64_t" | "uint64_t" => 8,
        other => {
            return Err(GennError::invalid_model(format!(
                "Unknown variable type '{}'",
                other
            )))
        }
    };
    Ok(size)
}

/// Where a variable's storage lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum VarLocation {
    Host,
    Device,
    #[default]
    HostDevice,
    HostDeviceZeroCopy,
}

impl VarLocation {
    pub fn on_host(self) -> bool {
        !matches!(self, VarLocation::Device)
    }

    pub fn on_device(self) -> bool {
        !matches!(self, VarLocation::Host)
    }

    pub fn is_zero_copy(self) -> bool {
        matches!(self, VarLocation::HostDeviceZeroCopy)
    }
}

/// How a model's code may access a variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum VarAccess {
    #[default]
    ReadWrite,
    ReadOnly,
    ReduceSum,
    ReduceMax,
}

/// Synaptic matrix storage and weight representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum MatrixType {
    DENSE_INDIVIDUALG,
    DENSE_GLOBALG,
    SPARSE_INDIVIDUALG,
    SPARSE_GLOBALG,
    BITMASK_GLOBALG,
    PROCEDURAL_PROCEDURALG,
    TOEPLITZ_KERNELG,
}

impl MatrixType {
    /// Connectivity stored as ragged rows that can be pushed and pulled
    pub fn is_sparse(self) -> bool {
        matches!(self, MatrixType::SPARSE_INDIVIDUALG | MatrixType::SPARSE_GLOBALG)
    }

    pub fn is_bitmask(self) -> bool {
        matches!(self, MatrixType::BITMASK_GLOBALG)
    }

    pub fn is_dense(self) -> bool {
        matches!(self, MatrixType::DENSE_INDIVIDUALG | MatrixType::DENSE_GLOBALG)
    }

    pub fn is_procedural(self) -> bool {
        matches!(self, MatrixType::PROCEDURAL_PROCEDURALG)
    }

    pub fn is_toeplitz(self) -> bool {
        matches!(self, MatrixType::TOEPLITZ_KERNELG)
    }

    /// Weight-update variables are stored per synapse
    pub fn has_individual_weights(self) -> bool {
        matches!(
            self,
            MatrixType::DENSE_INDIVIDUALG | MatrixType::SPARSE_INDIVIDUALG
        )
    }

    /// Connectivity is generated rather than fixed (needs an initialiser or explicit indices)
    pub fn has_connectivity(self) -> bool {
        self.is_sparse() || self.is_bitmask() || self.is_procedural()
    }
}

impl fmt::Display for MatrixType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl FromStr for MatrixType {
    type Err = GennError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "DENSE_INDIVIDUALG" => Ok(MatrixType::DENSE_INDIVIDUALG),
            "DENSE_GLOBALG" => Ok(MatrixType::DENSE_GLOBALG),
            "SPARSE_INDIVIDUALG" => Ok(MatrixType::SPARSE_INDIVIDUALG),
            "SPARSE_GLOBALG" => Ok(MatrixType::SPARSE_GLOBALG),
            "BITMASK_GLOBALG" => Ok(MatrixType::BITMASK_GLOBALG),
            "PROCEDURAL_PROCEDURALG" => Ok(MatrixType::PROCEDURAL_PROCEDURALG),
            "TOEPLITZ_KERNELG" => Ok(MatrixType::TOEPLITZ_KERNELG),
            other => Err(GennError::invalid_model(format!(
                "Unknown matrix type '{}'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precision_parsing() {
        assert_eq!("float".parse::<Precision>().unwrap(), Precision::Float);
        assert_eq!(" Double ".parse::<Precision>().unwrap(), Precision::Double);

        let err = "long double".parse::<Precision>().unwrap_err();
        assert!(err.is_configuration_error());
        assert!(err.to_string().contains("long double"));
    }

    #[test]
    fn test_scalar_follows_precision() {
        assert_eq!(type_size_bytes("scalar", Precision::Float).unwrap(), 4);
        assert_eq!(type_size_bytes("scalar", Precision::Double).unwrap(), 8);
        assert_eq!(type_size_bytes("uint8_t", Precision::Double).unwrap(), 1);
        assert!(type_size_bytes("quaternion", Precision::Float).is_err());
    }

    #[test]
    fn test_matrix_type_classification() {
        let sparse: MatrixType = "sparse_individualg".parse().unwrap();
        assert!(sparse.is_sparse());
        assert!(sparse.has_individual_weights());
        assert!(sparse.has_connectivity());

        assert!(!MatrixType::DENSE_GLOBALG.has_connectivity());
        assert!(MatrixType::BITMASK_GLOBALG.has_connectivity());
        assert!("CSR".parse::<MatrixType>().is_err());
    }

    #[test]
    fn test_var_location_flags() {
        assert!(VarLocation::Host.on_host());
        assert!(!VarLocation::Host.on_device());
        assert!(VarLocation::HostDeviceZeroCopy.is_zero_copy());
        assert_eq!(VarLocation::default(), VarLocation::HostDevice);
    }
}
